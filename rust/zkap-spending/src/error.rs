use thiserror::Error;

use crate::PassGroup;

/// Failures raised by a [`TokenInventory`](crate::TokenInventory).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Fewer tokens are available than were asked for. Nothing was drawn.
    #[error("Requested {requested} tokens but only {available} are available")]
    NotEnoughTokens {
        /// How many tokens were asked for.
        requested: usize,
        /// How many were available.
        available: usize,
    },

    /// The store behind the inventory failed.
    #[error("Token inventory error: {0}")]
    Backend(String),
}

/// Failures raised while drawing or settling passes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpendingError {
    /// The inventory cannot supply the requested number of passes. Nothing was
    /// drawn, so no remote call should be attempted.
    #[error("Insufficient tokens: requested {requested}, available {available}")]
    InsufficientTokens {
        /// How many passes were asked for.
        requested: u64,
        /// How many tokens the inventory had.
        available: u64,
    },

    /// The pass conversion returned a different number of passes than it was
    /// given tokens.
    #[error("Converted {tokens} tokens into {passes} passes")]
    MismatchedPasses {
        /// The number of tokens converted.
        tokens: usize,
        /// The number of passes produced.
        passes: usize,
    },

    /// The inventory failed for another reason.
    #[error(transparent)]
    Inventory(InventoryError),
}

impl From<InventoryError> for SpendingError {
    fn from(error: InventoryError) -> Self {
        match error {
            InventoryError::NotEnoughTokens {
                requested,
                available,
            } => SpendingError::InsufficientTokens {
                requested: requested as u64,
                available: available as u64,
            },
            other => SpendingError::Inventory(other),
        }
    }
}

/// Raised when a [`PassGroup`] could not be expanded.
///
/// The group is handed back unchanged so its holder can still settle it.
#[derive(Debug, Error)]
#[error("Failed to expand pass group: {source}")]
pub struct ExpandError {
    /// The group as it was before the attempt.
    pub group: PassGroup,
    /// Why no further passes could be drawn.
    pub source: SpendingError,
}

impl ExpandError {
    /// Splits the error into the untouched group and the failure.
    pub fn into_parts(self) -> (PassGroup, SpendingError) {
        (self.group, self.source)
    }
}

/// Raised when a [`PassGroup`] could not be settled.
///
/// The inventory did not accept the settlement, so the group comes back
/// holding every token and its holder must settle it again.
#[derive(Debug, Error)]
#[error("Failed to settle pass group: {source}")]
pub struct SettleError {
    /// The group, still holding its tokens.
    pub group: PassGroup,
    /// Why the inventory refused.
    pub source: SpendingError,
}

impl SettleError {
    /// Splits the error into the unsettled group and the failure.
    pub fn into_parts(self) -> (PassGroup, SpendingError) {
        (self.group, self.source)
    }
}
