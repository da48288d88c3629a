//! Credential wrapper that never renders its value

use std::fmt;

/// Fixed marker shown wherever a secret would be printed
pub const REDACTED: &str = "******";

/// A password or similar credential.
///
/// `Debug` and `Display` both print [`REDACTED`]; the raw value is only
/// reachable through [`Secret::expose`].
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_masked() {
        let pw = Secret::new("hunter2");
        assert_eq!(format!("{}", pw), REDACTED);
        assert_eq!(format!("{:?}", pw), REDACTED);
        assert_eq!(pw.expose(), "hunter2");
    }
}
