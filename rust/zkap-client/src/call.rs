use std::future::Future;

use zkap_pass::Pass;
use zkap_spending::{PassGroup, SettleError, SpendingError};
use zkap_storage::AuthorizationError;

use crate::ClientError;

fn log_settlement(result: Result<(), SettleError>) {
    if let Err(SettleError { group, source }) = result {
        tracing::warn!(error = %source, count = group.len(), "failed to settle pass group");
    }
}

/// Draws `num_passes` passes with `get_passes`, hands them to `operation` and
/// settles the group by the outcome:
///
/// - success: `on_success` receives the result and the group, and must settle
///   it (typically spending some passes and resetting the rest);
/// - [AuthorizationError::InsufficientPasses] with fewer valid passes than
///   were sent: the server rejected some of them, so the group is marked
///   invalid;
/// - [AuthorizationError::InsufficientPasses] with every pass valid: the
///   server wanted more passes than the client priced, so the group is
///   reset;
/// - anything else: nothing is known to have been spent, so the group is
///   reset.
///
/// If passes cannot be drawn the operation is never called. A failure to
/// settle the group is logged; the caller still sees the operation's outcome.
pub async fn call_with_passes_with_manual_spend<T, GetPasses, Operation, Fut, OnSuccess>(
    num_passes: u64,
    get_passes: GetPasses,
    operation: Operation,
    on_success: OnSuccess,
) -> Result<T, ClientError>
where
    GetPasses: FnOnce(u64) -> Result<PassGroup, SpendingError>,
    Operation: FnOnce(Vec<Pass>) -> Fut,
    Fut: Future<Output = Result<T, AuthorizationError>>,
    OnSuccess: FnOnce(&T, PassGroup) -> Result<(), SettleError>,
{
    let group = get_passes(num_passes)?;
    tracing::debug!(count = num_passes, "call with passes");

    match operation(group.passes()).await {
        Ok(result) => {
            log_settlement(on_success(&result, group));
            Ok(result)
        }
        Err(error) => {
            let rejected = matches!(
                error,
                AuthorizationError::InsufficientPasses { valid_count, .. }
                    if valid_count < group.len() as u64
            );
            if rejected {
                log_settlement(group.mark_invalid(&error.to_string()));
            } else {
                log_settlement(group.reset());
            }
            Err(error.into())
        }
    }
}

/// Like [call_with_passes_with_manual_spend], but spends the whole group when
/// the operation succeeds.
pub async fn call_with_passes<T, GetPasses, Operation, Fut>(
    num_passes: u64,
    get_passes: GetPasses,
    operation: Operation,
) -> Result<T, ClientError>
where
    GetPasses: FnOnce(u64) -> Result<PassGroup, SpendingError>,
    Operation: FnOnce(Vec<Pass>) -> Fut,
    Fut: Future<Output = Result<T, AuthorizationError>>,
{
    call_with_passes_with_manual_spend(num_passes, get_passes, operation, |_, group| {
        group.mark_spent()
    })
    .await
}
