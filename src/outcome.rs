//! Declined-or-succeeded results for pluggable handlers
//!
//! Discoverers and adapters are tried in turn by the fleet manager. A handler
//! that does not apply returns [`Outcome::Declined`]; a hard failure is an
//! `Err` on the surrounding [`crate::Result`].

use std::fmt;

/// Why a handler stepped aside
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineReason {
    /// Endpoint uses a transport this handler does not speak
    UnsupportedScheme(String),
    /// Cluster missing or managed by another hypervisor family
    HypervisorMismatch,
    /// Out-of-band probe could not reach or authenticate the endpoint
    ProbeFailed(String),
    /// Something unexpected went wrong after validation; already logged
    Unexpected(String),
    /// Input is not addressed to this handler
    NotApplicable,
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclineReason::UnsupportedScheme(s) => write!(f, "unsupported scheme '{}'", s),
            DeclineReason::HypervisorMismatch => write!(f, "hypervisor mismatch"),
            DeclineReason::ProbeFailed(r) => write!(f, "probe failed: {}", r),
            DeclineReason::Unexpected(r) => write!(f, "unexpected failure: {}", r),
            DeclineReason::NotApplicable => write!(f, "not applicable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Declined(DeclineReason),
    Succeeded(T),
}

impl<T> Outcome<T> {
    pub fn is_declined(&self) -> bool {
        matches!(self, Outcome::Declined(_))
    }

    pub fn succeeded(self) -> Option<T> {
        match self {
            Outcome::Succeeded(v) => Some(v),
            Outcome::Declined(_) => None,
        }
    }

    pub fn decline_reason(&self) -> Option<&DeclineReason> {
        match self {
            Outcome::Declined(r) => Some(r),
            Outcome::Succeeded(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Succeeded(v) => Outcome::Succeeded(f(v)),
            Outcome::Declined(r) => Outcome::Declined(r),
        }
    }
}
