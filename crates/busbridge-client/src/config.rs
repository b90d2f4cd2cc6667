use std::time::Duration;

use busbridge_frame::{FrameConfig, DEFAULT_MAX_PAYLOAD};

/// Default keepalive cadence.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_millis(5000);

/// Default time a request waits for its reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Runtime configuration for an [`EventBusClient`](crate::EventBusClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Interval between keepalive pings. Default: 5 s.
    pub ping_interval: Duration,
    /// Reply timeout used when a request does not specify one. Default: 30 s.
    pub request_timeout: Duration,
    /// Per-address connect timeout. `None` blocks until the OS gives up.
    pub connect_timeout: Option<Duration>,
    /// Socket write timeout. A write that stalls longer drops the connection.
    pub write_timeout: Option<Duration>,
    /// Largest envelope accepted or sent, in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Threads running message handlers, reply callbacks and error callbacks.
    pub worker_threads: usize,
}

impl ClientConfig {
    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
            read_timeout: None,
            write_timeout: self.write_timeout,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: None,
            write_timeout: None,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get().clamp(2, 16))
                .unwrap_or(4),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_expectations() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.ping_interval, Duration::from_secs(5));
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert!(cfg.worker_threads >= 2);

        let frame = cfg.frame_config();
        assert_eq!(frame.max_payload_size, DEFAULT_MAX_PAYLOAD);
        assert!(frame.read_timeout.is_none());
    }
}
