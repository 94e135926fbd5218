use thiserror::Error;

use sedori_core::{AccessError, ValidationError};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("run aborted: {reason}")]
    RunAborted { reason: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Access(error) if error.is_fatal() => 3,
            Self::Access(_) => 4,
            Self::RunAborted { .. } => 3,
            Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sedori_core::ProviderId;

    #[test]
    fn fatal_access_errors_exit_with_three() {
        let error = CliError::Access(AccessError::BudgetExhausted {
            tokens_left: 0,
            required: 20,
        });
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn item_scoped_access_errors_exit_with_four() {
        let error = CliError::Access(AccessError::UpstreamStatus {
            provider: ProviderId::Keepa,
            status: 500,
            attempts: 3,
        });
        assert_eq!(error.exit_code(), 4);
    }

    #[test]
    fn validation_errors_exit_with_two() {
        let error = CliError::Validation(ValidationError::EmptyCode);
        assert_eq!(error.exit_code(), 2);
    }
}
