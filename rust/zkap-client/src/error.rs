use thiserror::Error;
use zkap_spending::SpendingError;
use zkap_storage::AuthorizationError;

/// Failures raised by a pass-paying storage client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Passes could not be drawn, so no remote call was made.
    #[error(transparent)]
    Spending(#[from] SpendingError),

    /// The server refused or failed the operation.
    #[error(transparent)]
    Server(#[from] AuthorizationError),
}
