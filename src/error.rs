use std::fmt;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{AbortError, ApplyError, PlanError, state_machine::StaleTransition},
};

/// Why a local player action was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The valid roster already holds the maximum number of players.
    Full,
    /// Action not allowed in the current phase or for the local role.
    InvalidPhase,
    /// The local player already guessed during this round.
    AlreadyGuessed,
    /// The peer has no player in the session.
    NotJoined,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::Full => "session is full",
            RejectReason::InvalidPhase => "not allowed in the current phase",
            RejectReason::AlreadyGuessed => "already guessed this round",
            RejectReason::NotJoined => "no player joined from this peer",
        };
        f.write_str(text)
    }
}

/// Errors that can occur in session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// User-visible refusal, reported at the call site.
    #[error("rejected: {0}")]
    Rejected(RejectReason),
    /// Another peer already advanced the round; swallowed by internal callers.
    #[error(transparent)]
    Stale(#[from] StaleTransition),
    /// A different round state was observed while the transition was in flight.
    #[error("round changed while the transition was in flight")]
    Superseded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Local transition bookkeeping is inconsistent.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Shared store rejected the operation.
    #[error("storage unavailable")]
    Storage(#[from] StorageError),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl SessionError {
    /// Whether the error only means another peer won a race.
    pub fn is_race(&self) -> bool {
        matches!(self, SessionError::Stale(_) | SessionError::Superseded)
    }
}

impl From<RejectReason> for SessionError {
    fn from(reason: RejectReason) -> Self {
        SessionError::Rejected(reason)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Rejected(reason) => AppError::Conflict(reason.to_string()),
            SessionError::Stale(stale) => AppError::Conflict(stale.to_string()),
            SessionError::Superseded => {
                AppError::Conflict("round changed while the transition was in flight".into())
            }
            SessionError::InvalidInput(message) => AppError::BadRequest(message),
            SessionError::InvalidState(message) => AppError::Conflict(message),
            SessionError::Storage(source) => AppError::ServiceUnavailable(source.to_string()),
            SessionError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

impl From<PlanError> for SessionError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                SessionError::InvalidState("round transition already pending".into())
            }
            PlanError::Stale(stale) => SessionError::Stale(stale),
        }
    }
}

impl From<ApplyError> for SessionError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::NoPending => SessionError::InvalidState("no transition is pending".into()),
            ApplyError::IdMismatch { .. } => {
                SessionError::InvalidState("pending transition does not match".into())
            }
            ApplyError::VersionMismatch { .. } => SessionError::Superseded,
        }
    }
}

impl From<AbortError> for SessionError {
    fn from(err: AbortError) -> Self {
        match err {
            AbortError::NoPending => SessionError::InvalidState("no pending transition".into()),
            AbortError::IdMismatch { .. } => {
                SessionError::InvalidState("transition plan does not match".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;

    use super::*;

    #[test]
    fn full_session_maps_to_conflict() {
        let response = AppError::from(SessionError::from(RejectReason::Full)).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn storage_failure_maps_to_unavailable() {
        let response = AppError::from(SessionError::from(StorageError::Closed)).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn version_mismatch_counts_as_race() {
        let err = SessionError::from(ApplyError::VersionMismatch {
            expected: 1,
            actual: 2,
        });
        assert!(err.is_race());
        assert!(!SessionError::from(RejectReason::AlreadyGuessed).is_race());
    }
}
