use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SpliceError {
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("rejected: {message}")]
    Rejected { message: String },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("validation error: {message}")]
    Validation { message: String },
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl SpliceError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Stable machine-readable code (snake_case).
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Rejected { .. } => "rejected",
            Self::NotFound { .. } => "not_found",
            Self::Validation { .. } => "validation",
            Self::Conflict { .. } => "conflict",
            Self::Storage { .. } => "storage",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transport { message }
            | Self::Rejected { message }
            | Self::NotFound { message }
            | Self::Validation { message }
            | Self::Conflict { message }
            | Self::Storage { message } => message,
        }
    }

    /// True for failures detected before any remote call was made.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

pub type SpliceResult<T> = Result<T, SpliceError>;

impl From<serde_json::Error> for SpliceError {
    fn from(value: serde_json::Error) -> Self {
        SpliceError::validation(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::SpliceError;

    #[test]
    fn helper_constructors_set_variants() {
        let err = SpliceError::transport("offline");
        assert!(matches!(err, SpliceError::Transport { .. }));
        let err = SpliceError::rejected("port taken");
        assert!(matches!(err, SpliceError::Rejected { .. }));
        let err = SpliceError::not_found("structure");
        assert!(matches!(err, SpliceError::NotFound { .. }));
        let err = SpliceError::validation("bad");
        assert!(matches!(err, SpliceError::Validation { .. }));
        let err = SpliceError::conflict("dup");
        assert!(matches!(err, SpliceError::Conflict { .. }));
        let err = SpliceError::storage("disk");
        assert!(matches!(err, SpliceError::Storage { .. }));
    }

    #[test]
    fn code_and_message_are_exposed() {
        let err = SpliceError::conflict("group overlaps");
        assert_eq!(err.code(), "conflict");
        assert_eq!(err.message(), "group overlaps");
        assert_eq!(err.to_string(), "conflict: group overlaps");
        assert!(SpliceError::validation("x").is_validation());
        assert!(!SpliceError::transport("x").is_validation());
    }
}
