//! Wi-Fi credentials persisted as a unit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Network identity and secret.
///
/// Both fields non-empty is the precondition for entering operational mode;
/// either one empty sends the device into provisioning.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }

    /// `true` when both fields are present.
    pub fn is_complete(&self) -> bool {
        !self.ssid.is_empty() && !self.password.is_empty()
    }
}

// The password never reaches a log line.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_fields_present_is_complete() {
        assert!(Credentials::new("home", "secret1").is_complete());
    }

    #[test]
    fn test_empty_ssid_or_password_is_incomplete() {
        assert!(!Credentials::new("", "secret1").is_complete());
        assert!(!Credentials::new("home", "").is_complete());
        assert!(!Credentials::default().is_complete());
    }

    #[test]
    fn test_debug_output_redacts_password() {
        let rendered = format!("{:?}", Credentials::new("home", "secret1"));
        assert!(rendered.contains("home"));
        assert!(!rendered.contains("secret1"));
    }
}
