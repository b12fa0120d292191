use std::sync::Arc;

use zkap_pass::UnblindedToken;

use crate::InventoryError;

mod memory;
pub use memory::*;

/// The client's store of unspent tokens.
///
/// Tokens handed out by [TokenInventory::get] are in use until exactly one of
/// [TokenInventory::discard], [TokenInventory::invalidate] or
/// [TokenInventory::reset] is called for them. Those three must tolerate
/// tokens that are unknown or already settled.
pub trait TokenInventory: Send + Sync {
    /// Draw exactly `count` available tokens and mark them in use, or draw
    /// nothing.
    fn get(&self, count: usize) -> Result<Vec<UnblindedToken>, InventoryError>;

    /// Forget `tokens`; they have been spent.
    fn discard(&self, tokens: &[UnblindedToken]) -> Result<(), InventoryError>;

    /// Set `tokens` aside as unusable, remembering `reason`.
    fn invalidate(&self, reason: &str, tokens: &[UnblindedToken]) -> Result<(), InventoryError>;

    /// Make `tokens` available again.
    fn reset(&self, tokens: &[UnblindedToken]) -> Result<(), InventoryError>;
}

impl<T> TokenInventory for Arc<T>
where
    T: TokenInventory + ?Sized,
{
    fn get(&self, count: usize) -> Result<Vec<UnblindedToken>, InventoryError> {
        T::get(self, count)
    }

    fn discard(&self, tokens: &[UnblindedToken]) -> Result<(), InventoryError> {
        T::discard(self, tokens)
    }

    fn invalidate(&self, reason: &str, tokens: &[UnblindedToken]) -> Result<(), InventoryError> {
        T::invalidate(self, reason, tokens)
    }

    fn reset(&self, tokens: &[UnblindedToken]) -> Result<(), InventoryError> {
        T::reset(self, tokens)
    }
}
