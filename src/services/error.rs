use thiserror::Error;

/// Failures surfaced by lifecycle operations.
///
/// `NotUploaded`, `CountTooLarge`, `ArgumentRequired` and `AuthRequired` are
/// business outcomes the caller can act on; `Internal` wraps infrastructure
/// faults.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("owner identity is required")]
    AuthRequired,

    #[error("argument '{0}' is required")]
    ArgumentRequired(String),

    #[error("requested {requested} upload urls, at most {max} allowed")]
    CountTooLarge { requested: usize, max: usize },

    #[error("image not uploaded: {0}")]
    NotUploaded(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LifecycleError {
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LifecycleError::Internal(_))
    }
}

impl From<anyhow::Error> for LifecycleError {
    fn from(e: anyhow::Error) -> Self {
        LifecycleError::Internal(format!("{:#}", e))
    }
}

impl From<crate::services::record_store::StoreError> for LifecycleError {
    fn from(e: crate::services::record_store::StoreError) -> Self {
        LifecycleError::Internal(e.to_string())
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_failures_are_recoverable() {
        assert!(LifecycleError::NotUploaded("k".into()).is_recoverable());
        assert!(
            LifecycleError::CountTooLarge {
                requested: 21,
                max: 20
            }
            .is_recoverable()
        );
        assert!(!LifecycleError::Internal("boom".into()).is_recoverable());
    }

    #[test]
    fn test_anyhow_becomes_internal() {
        let err: LifecycleError = anyhow::anyhow!("s3 unreachable").into();
        assert_eq!(err, LifecycleError::Internal("s3 unreachable".into()));
    }

    #[test]
    fn test_count_too_large_message() {
        let err = LifecycleError::CountTooLarge {
            requested: 30,
            max: 20,
        };
        assert_eq!(err.to_string(), "requested 30 upload urls, at most 20 allowed");
    }
}
