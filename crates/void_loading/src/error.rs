//! Error types for loading operations

use thiserror::Error;

use crate::scene::SceneError;

/// Boxed error used for failures of wrapped computations
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A scene identifier had a shape the scene subsystem cannot address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid load target: {description} (expected a scene name or a non-negative index)")]
pub struct InvalidTarget {
    /// What the rejected identifier looked like
    pub description: String,
}

impl InvalidTarget {
    /// Create a new invalid-target error
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// Loading errors
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    InvalidTarget(#[from] InvalidTarget),

    #[error("Scene operation on '{target}' failed: {source}")]
    Scene {
        target: String,
        #[source]
        source: SceneError,
    },

    #[error("Load unit '{unit}' failed: {source}")]
    UnitFailed {
        unit: String,
        #[source]
        source: BoxError,
    },

    #[error("Load unit '{0}' has already run")]
    AlreadyRun(String),

    #[error("Loading cancelled")]
    Cancelled,
}

impl LoadError {
    /// Wrap an arbitrary failure of the named unit
    pub fn unit_failed(unit: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::UnitFailed {
            unit: unit.into(),
            source: source.into(),
        }
    }

    /// Whether this is a cooperative cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the unit was rejected before it ran
    pub fn is_invalid_target(&self) -> bool {
        matches!(self, Self::InvalidTarget(_))
    }
}

pub type LoadResult<T> = Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(LoadError::Cancelled.is_cancelled());
        assert!(!LoadError::Cancelled.is_invalid_target());

        let invalid: LoadError = InvalidTarget::new("float 3.5").into();
        assert!(invalid.is_invalid_target());
        assert!(!invalid.is_cancelled());
    }

    #[test]
    fn test_unit_failed_keeps_source() {
        let err = LoadError::unit_failed("warmup", "shader cache missing");
        assert_eq!(
            err.to_string(),
            "Load unit 'warmup' failed: shader cache missing"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_invalid_target_message() {
        let err = LoadError::from(InvalidTarget::new("boolean true"));
        assert!(err.to_string().contains("boolean true"));
    }
}
