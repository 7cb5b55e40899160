use std::time::Duration;

/// Serial speed used when none is given.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Time Bluetooth RFCOMM links need after open before they pass data.
pub const RFCOMM_SETTLE: Duration = Duration::from_millis(1500);

/// Session behaviour configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Serial baud rate. Ignored for TCP targets.
    pub baud: u32,
    /// Delay after opening an RFCOMM device, before the first request.
    pub rfcomm_settle: Duration,
    /// Send an FC_VARIANT query as soon as the session is up.
    pub handshake: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            baud: DEFAULT_BAUD,
            rfcomm_settle: RFCOMM_SETTLE,
            handshake: true,
        }
    }
}

impl SessionConfig {
    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    pub fn with_handshake(mut self, handshake: bool) -> Self {
        self.handshake = handshake;
        self
    }

    pub fn with_rfcomm_settle(mut self, settle: Duration) -> Self {
        self.rfcomm_settle = settle;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.baud, 115_200);
        assert_eq!(cfg.rfcomm_settle, Duration::from_millis(1500));
        assert!(cfg.handshake);
    }

    #[test]
    fn builders_override() {
        let cfg = SessionConfig::default()
            .with_baud(57_600)
            .with_handshake(false)
            .with_rfcomm_settle(Duration::ZERO);
        assert_eq!(cfg.baud, 57_600);
        assert!(!cfg.handshake);
        assert_eq!(cfg.rfcomm_settle, Duration::ZERO);
    }
}
