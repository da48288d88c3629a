//! Error types for hostfleet

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error("Unable to find load balancer rule {0}")]
    OwnerResolution(u64),

    #[error("Cannot find zone {0}")]
    UnknownZone(u64),

    #[error("Failed to create autoscale vm group: {reason}")]
    CreationFailed {
        reason: String,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("Failed to activate autoscale vm group {group_id}")]
    ActivationFailed {
        group_id: u64,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("VM {vm_id} is still running on host {host_id}")]
    HostBusy { vm_id: u64, host_id: u64 },

    #[error("Configuration error: {0}")]
    FatalConfiguration(String),

    #[error("Adapter already registered: {0}")]
    DuplicateAdapter(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Caller input was malformed; nothing was mutated.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::MissingRequiredField(_) | Error::OwnerResolution(_)
        )
    }

    /// Host deletion was blocked by an active VM
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::HostBusy { .. })
    }

    pub(crate) fn creation(reason: impl Into<String>, cause: Option<Error>) -> Self {
        Error::CreationFailed {
            reason: reason.into(),
            source: cause.map(Box::new),
        }
    }

    pub(crate) fn activation(group_id: u64, cause: Option<Error>) -> Self {
        Error::ActivationFailed {
            group_id,
            source: cause.map(Box::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(Error::MissingRequiredField("clusterId").is_validation());
        assert!(Error::OwnerResolution(42).is_validation());
        assert!(!Error::UnknownZone(1).is_validation());
        assert!(Error::HostBusy { vm_id: 1, host_id: 2 }.is_busy());
    }

    #[test]
    fn test_activation_wraps_cause() {
        let err = Error::activation(7, Some(Error::Probe("boom".into())));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Probe failed: boom"));
        assert_eq!(err.to_string(), "Failed to activate autoscale vm group 7");
    }

    #[test]
    fn test_creation_keeps_service_error() {
        let err = Error::creation("service error", Some(Error::NotFound("account 9".into())));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Not found: account 9"));
        assert!(std::error::Error::source(&Error::creation("service returned no group", None)).is_none());
    }
}
