use axum::http::StatusCode;
use thiserror::Error;

/// Domain errors surfaced by the progression engine. Locked/finished
/// rejections are guaranteed to leave the state machine untouched so the
/// caller can simply show a notice and retry later.
#[derive(Debug, Error)]
pub enum ProgressionError {
    #[error("round {0} is locked")]
    RoundLocked(String),

    #[error("round {0} is already finished")]
    RoundFinished(String),

    #[error("question {0} is locked")]
    QuestionLocked(usize),

    #[error("no question at index {0}")]
    UnknownQuestion(usize),

    #[error("no open session for participant {0}")]
    SessionNotOpen(String),

    #[error("submission is closed for this question")]
    SubmissionClosed,

    #[error("skip requires a later question in the same round")]
    NothingToSkipTo,

    #[error("action not allowed while question is {0}")]
    InvalidTransition(&'static str),

    #[error("progress store failure: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl ProgressionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProgressionError::RoundLocked(_)
            | ProgressionError::RoundFinished(_)
            | ProgressionError::QuestionLocked(_) => StatusCode::LOCKED,
            ProgressionError::UnknownQuestion(_) | ProgressionError::SessionNotOpen(_) => {
                StatusCode::NOT_FOUND
            }
            ProgressionError::SubmissionClosed
            | ProgressionError::NothingToSkipTo
            | ProgressionError::InvalidTransition(_) => StatusCode::CONFLICT,
            ProgressionError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn persistence(err: impl Into<anyhow::Error>) -> Self {
        ProgressionError::Persistence(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_errors_map_to_423() {
        assert_eq!(
            ProgressionError::RoundLocked("medium".into()).status_code(),
            StatusCode::LOCKED
        );
        assert_eq!(
            ProgressionError::QuestionLocked(3).status_code(),
            StatusCode::LOCKED
        );
    }

    #[test]
    fn persistence_maps_to_503() {
        let err = ProgressionError::persistence(anyhow::anyhow!("write failed"));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
