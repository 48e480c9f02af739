//! The operating modes of the device.
//!
//! ```text
//!                 credentials saved (restart)
//!  Provisioning ──────────────────────────────► Operational ◄──┐
//!       ▲                                          │  enable   │
//!       │          reset (restart)                 ▼  disable  │
//!       └───────────────────────────────── OperationalDisabled ┘
//! ```
//!
//! The transitions themselves live on the session types in
//! `application::device_state`; this enum is the observable label.

use std::fmt;

/// Which mode the device is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeMode {
    /// No credentials: captive portal, no bridge.
    Provisioning,
    /// Bridge active, bus driver running.
    Operational,
    /// Bridge endpoints reachable, bus driver stopped.
    OperationalDisabled,
}

impl fmt::Display for BridgeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Provisioning => "provisioning",
            Self::Operational => "operational",
            Self::OperationalDisabled => "operational (bus disabled)",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_labels() {
        assert_eq!(BridgeMode::Provisioning.to_string(), "provisioning");
        assert_eq!(
            BridgeMode::OperationalDisabled.to_string(),
            "operational (bus disabled)"
        );
    }
}
