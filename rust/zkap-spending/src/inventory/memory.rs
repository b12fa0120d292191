use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use zkap_pass::UnblindedToken;

use crate::{InventoryError, TokenInventory};

#[derive(Debug, Default)]
struct State {
    available: IndexSet<UnblindedToken>,
    in_use: IndexSet<UnblindedToken>,
    spent: IndexSet<UnblindedToken>,
    invalid: IndexMap<UnblindedToken, String>,
}

impl State {
    fn knows(&self, token: &UnblindedToken) -> bool {
        self.available.contains(token)
            || self.in_use.contains(token)
            || self.spent.contains(token)
            || self.invalid.contains_key(token)
    }
}

/// A [TokenInventory] kept in memory. Tokens are drawn in the order they were
/// inserted. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenInventory {
    state: Arc<Mutex<State>>,
}

impl MemoryTokenInventory {
    /// Creates an inventory holding `tokens`.
    pub fn with_tokens<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = UnblindedToken>,
    {
        let inventory = Self::default();
        inventory.insert(tokens);
        inventory
    }

    /// Adds newly redeemed tokens. Tokens the inventory has seen before, in
    /// any state, are ignored.
    pub fn insert<I>(&self, tokens: I)
    where
        I: IntoIterator<Item = UnblindedToken>,
    {
        let mut state = self.state.lock();
        for token in tokens {
            if !state.knows(&token) {
                state.available.insert(token);
            }
        }
    }

    /// Tokens that may be drawn, in draw order.
    pub fn available(&self) -> Vec<UnblindedToken> {
        self.state.lock().available.iter().cloned().collect()
    }

    /// Tokens drawn and not yet settled.
    pub fn in_use(&self) -> Vec<UnblindedToken> {
        self.state.lock().in_use.iter().cloned().collect()
    }

    /// Tokens that were spent.
    pub fn spent(&self) -> Vec<UnblindedToken> {
        self.state.lock().spent.iter().cloned().collect()
    }

    /// Tokens set aside as unusable, with the reason given.
    pub fn invalid(&self) -> Vec<(UnblindedToken, String)> {
        self.state
            .lock()
            .invalid
            .iter()
            .map(|(token, reason)| (token.clone(), reason.clone()))
            .collect()
    }
}

impl TokenInventory for MemoryTokenInventory {
    fn get(&self, count: usize) -> Result<Vec<UnblindedToken>, InventoryError> {
        let mut state = self.state.lock();
        let available = state.available.len();
        if available < count {
            return Err(InventoryError::NotEnoughTokens {
                requested: count,
                available,
            });
        }

        let drawn = state.available.drain(..count).collect::<Vec<_>>();
        state.in_use.extend(drawn.iter().cloned());
        Ok(drawn)
    }

    fn discard(&self, tokens: &[UnblindedToken]) -> Result<(), InventoryError> {
        let mut state = self.state.lock();
        for token in tokens {
            if state.in_use.shift_remove(token) || state.available.shift_remove(token) {
                state.spent.insert(token.clone());
            }
        }
        Ok(())
    }

    fn invalidate(&self, reason: &str, tokens: &[UnblindedToken]) -> Result<(), InventoryError> {
        let mut state = self.state.lock();
        for token in tokens {
            if state.in_use.shift_remove(token) || state.available.shift_remove(token) {
                state.invalid.insert(token.clone(), reason.to_owned());
            }
        }
        Ok(())
    }

    fn reset(&self, tokens: &[UnblindedToken]) -> Result<(), InventoryError> {
        let mut state = self.state.lock();
        for token in tokens {
            if state.in_use.shift_remove(token) {
                state.available.insert(token.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use zkap_pass::{SigningKey, random_unblinded_tokens};

    use super::*;

    fn inventory(count: usize) -> (MemoryTokenInventory, Vec<UnblindedToken>) {
        let tokens = random_unblinded_tokens(&SigningKey::random(), count);
        (MemoryTokenInventory::with_tokens(tokens.clone()), tokens)
    }

    #[test]
    fn it_draws_in_insertion_order() -> Result<()> {
        let (inventory, tokens) = inventory(5);

        assert_eq!(inventory.get(2)?, tokens[..2].to_vec());
        assert_eq!(inventory.get(3)?, tokens[2..].to_vec());
        assert!(inventory.available().is_empty());
        assert_eq!(inventory.in_use(), tokens);
        Ok(())
    }

    #[test]
    fn it_draws_nothing_when_short() -> Result<()> {
        let (inventory, tokens) = inventory(2);

        assert_eq!(
            inventory.get(3),
            Err(InventoryError::NotEnoughTokens {
                requested: 3,
                available: 2
            })
        );
        assert_eq!(inventory.available(), tokens);
        assert!(inventory.in_use().is_empty());
        Ok(())
    }

    #[test]
    fn it_settles_tokens_idempotently() -> Result<()> {
        let (inventory, tokens) = inventory(3);
        let drawn = inventory.get(3)?;

        inventory.discard(&drawn[..1])?;
        inventory.discard(&drawn[..1])?;
        inventory.invalidate("double spend", &drawn[1..2])?;
        inventory.reset(&drawn[1..2])?;
        inventory.reset(&drawn[2..])?;
        inventory.reset(&drawn[2..])?;

        assert_eq!(inventory.spent(), vec![tokens[0].clone()]);
        assert_eq!(
            inventory.invalid(),
            vec![(tokens[1].clone(), "double spend".to_owned())]
        );
        assert_eq!(inventory.available(), vec![tokens[2].clone()]);
        assert!(inventory.in_use().is_empty());
        Ok(())
    }

    #[test]
    fn it_ignores_tokens_it_has_already_seen() -> Result<()> {
        let (inventory, tokens) = inventory(1);
        let drawn = inventory.get(1)?;
        inventory.discard(&drawn)?;

        inventory.insert(tokens);
        assert!(inventory.available().is_empty());
        Ok(())
    }
}
