use std::time::Duration;

use xbee_frame::{FrameConfig, DEFAULT_MAX_FRAME_LENGTH};

/// Default deadline for a single command or transmit request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Default deadline for node discovery to finish.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of frames buffered per listening peer.
pub const DEFAULT_SUBSCRIPTION_CAPACITY: usize = 16;

/// Radio configuration.
#[derive(Debug, Clone)]
pub struct RadioConfig {
    /// Deadline for commands and transmit requests. Default: 2s.
    pub request_timeout: Duration,
    /// Deadline for node discovery, which waits for every node to answer. Default: 10s.
    pub discovery_timeout: Duration,
    /// Frames queued per peer before the decode loop blocks. Default: 16.
    pub subscription_capacity: usize,
    /// Largest declared length accepted from the radio. Default: 512.
    pub max_frame_length: usize,
}

impl RadioConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Zero makes every delivery a rendezvous with the listener.
    pub fn with_subscription_capacity(mut self, capacity: usize) -> Self {
        self.subscription_capacity = capacity;
        self
    }

    pub fn with_max_frame_length(mut self, max: usize) -> Self {
        self.max_frame_length = max;
        self
    }

    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig::default().with_max_frame_length(self.max_frame_length)
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            subscription_capacity: DEFAULT_SUBSCRIPTION_CAPACITY,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RadioConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.discovery_timeout, Duration::from_secs(10));
        assert_eq!(config.subscription_capacity, 16);
        assert_eq!(config.frame_config().max_frame_length, 512);
    }

    #[test]
    fn builders() {
        let config = RadioConfig::default()
            .with_request_timeout(Duration::from_millis(50))
            .with_discovery_timeout(Duration::from_millis(500))
            .with_subscription_capacity(0)
            .with_max_frame_length(128);
        assert_eq!(config.request_timeout, Duration::from_millis(50));
        assert_eq!(config.discovery_timeout, Duration::from_millis(500));
        assert_eq!(config.subscription_capacity, 0);
        assert_eq!(config.frame_config().max_frame_length, 128);
    }
}
