use tracing::debug;

use crate::{
    error::SessionError,
    state::{
        SessionContext,
        state_machine::{RoundState, TurnEvent},
    },
};

/// Execute a guarded round transition, treating a lost race as a silent no-op.
///
/// Returns `Ok(None)` when another peer advanced the round first; the store
/// notification for that write brings every peer in line.
pub async fn run_transition_or_skip<F, Fut, T>(
    session: &SessionContext,
    event: TurnEvent,
    work: F,
) -> Result<Option<(T, RoundState)>, SessionError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, SessionError>>,
{
    match session.run_transition(event, work).await {
        Ok(done) => Ok(Some(done)),
        Err(err) if err.is_race() => {
            debug!(peer = %session.peer_id(), error = %err, "transition skipped");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
