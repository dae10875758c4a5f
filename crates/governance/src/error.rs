use thiserror::Error;

/// Result type for governance operations.
pub type GovernanceResult<T> = Result<T, GovernanceError>;

/// Governance-layer errors.
///
/// Only [`GovernanceError::StoreUnavailable`] ever escapes
/// [`crate::SuspensionOrchestrator::auto_suspend`]. Matching and scanning
/// failures degrade to "no match" / "no evidence" locally.
#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("approval store unavailable during {operation} (class {class_id}): {message}")]
    StoreUnavailable {
        operation: StoreOperation,
        class_id: String,
        message: String,
    },

    #[error("delegation registry error: {0}")]
    Registry(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("operator journal error: {0}")]
    Journal(String),
}

impl GovernanceError {
    pub fn store_read(class_id: impl Into<String>, message: impl ToString) -> Self {
        Self::StoreUnavailable {
            operation: StoreOperation::Read,
            class_id: class_id.into(),
            message: message.to_string(),
        }
    }

    pub fn store_write(class_id: impl Into<String>, message: impl ToString) -> Self {
        Self::StoreUnavailable {
            operation: StoreOperation::Write,
            class_id: class_id.into(),
            message: message.to_string(),
        }
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

/// Which side of the approval store failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Read,
    Write,
}

impl std::fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_unavailable_display() {
        let err = GovernanceError::store_write("c1", "disk full");
        let text = err.to_string();
        assert!(text.contains("write"));
        assert!(text.contains("c1"));
        assert!(text.contains("disk full"));
        assert!(err.is_store_unavailable());
    }

    #[test]
    fn registry_error_is_not_store_failure() {
        let err = GovernanceError::Registry("bad toml".into());
        assert!(!err.is_store_unavailable());
    }
}
