//! Error types for host and configuration store operations.
//!
//! Errors are categorized so the installer can tell a condition worth
//! retrying (a dependency that may show up later) from a permanent defect
//! (a payload that will never install).

use thiserror::Error;

/// Categories of host errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A required capability or service is not there yet
    DependencyUnmet,
    /// Transient host fault
    Transient,
    /// Target does not exist on the host
    NotFound,
    /// Payload or version can never be installed
    InvalidPayload,
    /// Adapter refused the operation for good
    Rejected,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether an operation failing with this category may succeed later.
    ///
    /// Unclassified errors count as retryable so that a transient host
    /// fault never loses an installable resource.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DependencyUnmet | Self::Transient | Self::NotFound | Self::Other
        )
    }

    /// Whether this error means a removal already happened.
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::DependencyUnmet => "Dependency not satisfied",
            Self::Transient => "Transient host failure",
            Self::NotFound => "Target not found",
            Self::InvalidPayload => "Invalid payload",
            Self::Rejected => "Rejected by host",
            Self::Other => "Unexpected error",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to a module host or configuration store.
#[derive(Debug, Error)]
pub enum Error {
    /// A module requires something the host cannot resolve yet
    #[error("unresolved dependency for {location}: {message}")]
    DependencyUnmet {
        /// Location of the module that could not be resolved
        location: String,
        /// What is missing
        message: String,
    },

    /// The configuration store is not available
    #[error("configuration store unavailable")]
    ConfigStoreUnavailable,

    /// Nothing is installed at this location
    #[error("not found: {location}")]
    NotFound {
        /// Location or configuration name that was looked up
        location: String,
    },

    /// Malformed bundle manifest or configuration payload
    #[error("invalid payload: {message}")]
    InvalidPayload {
        /// Description of the defect
        message: String,
    },

    /// Version string that does not parse
    #[error("invalid version '{version}': {message}")]
    InvalidVersion {
        /// The offending version string
        version: String,
        /// Why it is invalid
        message: String,
    },

    /// Host refused the operation and will keep refusing it
    #[error("rejected: {message}")]
    Rejected {
        /// Reason given by the host
        message: String,
    },

    /// Transient host failure
    #[error("host error: {message}")]
    Host {
        /// Detailed error message
        message: String,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::DependencyUnmet { .. } | Error::ConfigStoreUnavailable => {
                ErrorCategory::DependencyUnmet
            }
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::InvalidPayload { .. } | Error::InvalidVersion { .. } => {
                ErrorCategory::InvalidPayload
            }
            Error::Rejected { .. } => ErrorCategory::Rejected,
            Error::Host { .. } => ErrorCategory::Transient,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this error can be safely ignored when removing.
    pub fn is_ignorable(&self) -> bool {
        self.category().is_ignorable()
    }
}

/// Result type for host operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::DependencyUnmet.is_retryable());
        assert!(ErrorCategory::Transient.is_retryable());
        assert!(ErrorCategory::Other.is_retryable());
        assert!(!ErrorCategory::InvalidPayload.is_retryable());
        assert!(!ErrorCategory::Rejected.is_retryable());
    }

    #[test]
    fn test_error_category_ignorable() {
        assert!(ErrorCategory::NotFound.is_ignorable());
        assert!(!ErrorCategory::DependencyUnmet.is_ignorable());
    }

    #[test]
    fn test_config_store_unavailable_is_dependency() {
        let err = Error::ConfigStoreUnavailable;
        assert_eq!(err.category(), ErrorCategory::DependencyUnmet);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_invalid_version_is_terminal() {
        let err = Error::InvalidVersion {
            version: "1.x".to_string(),
            message: "bad minor".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::InvalidPayload);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unclassified_error_is_retryable() {
        let err = Error::Other("socket closed".to_string());
        assert!(err.is_retryable());
    }
}
