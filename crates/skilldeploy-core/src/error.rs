//! Error types for the deploy pipeline.
//!
//! Polling and orchestration return these typed errors; file helpers use
//! `anyhow` and are folded into `Storage`/`Package` at stage boundaries.

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("service returned HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("job failed: {body}")]
    JobFailed {
        body: String,
        failing_locales: Vec<String>,
    },

    #[error("polling did not complete in time after {attempts} attempts")]
    PollExhausted { attempts: u32 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded before the operation completed")]
    DeadlineExceeded,

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("package error: {0}")]
    Package(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{stage} failed: {message}")]
    Delegate { stage: String, message: String },
}

impl DeployError {
    /// Whether the remote job reached a terminal state and reported failure,
    /// as opposed to us giving up on it.
    pub fn is_terminal_outcome(&self) -> bool {
        matches!(self, DeployError::JobFailed { .. })
    }

    /// Whether polling stopped without the job reaching a terminal state.
    pub fn is_abandoned(&self) -> bool {
        matches!(
            self,
            DeployError::PollExhausted { .. }
                | DeployError::Cancelled
                | DeployError::DeadlineExceeded
        )
    }

    pub(crate) fn storage(err: anyhow::Error) -> Self {
        DeployError::Storage(format!("{err:#}"))
    }

    pub(crate) fn package(err: anyhow::Error) -> Self {
        DeployError::Package(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeployError::Service {
            status: 400,
            body: r#"{"message":"bad vendor"}"#.to_string(),
        };
        assert_eq!(
            err.to_string(),
            r#"service returned HTTP 400: {"message":"bad vendor"}"#
        );

        let err = DeployError::PollExhausted { attempts: 3 };
        assert!(err.to_string().contains("did not complete in time"));

        let err = DeployError::JobFailed {
            body: "{}".to_string(),
            failing_locales: vec!["en-US".to_string()],
        };
        assert!(err.to_string().starts_with("job failed"));

        let err = DeployError::Delegate {
            stage: "code build".to_string(),
            message: "exit status 1".to_string(),
        };
        assert_eq!(err.to_string(), "code build failed: exit status 1");
    }

    #[test]
    fn test_failed_and_abandoned_are_disjoint() {
        let failed = DeployError::JobFailed {
            body: String::new(),
            failing_locales: Vec::new(),
        };
        assert!(failed.is_terminal_outcome());
        assert!(!failed.is_abandoned());

        for err in [
            DeployError::PollExhausted { attempts: 1 },
            DeployError::Cancelled,
            DeployError::DeadlineExceeded,
        ] {
            assert!(err.is_abandoned());
            assert!(!err.is_terminal_outcome());
        }

        assert!(!DeployError::Transport("dns".into()).is_abandoned());
    }
}
