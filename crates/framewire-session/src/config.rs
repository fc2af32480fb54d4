use std::time::Duration;

use framewire_codec::FrameConfig;

/// How long `close()` waits for a loop thread before detaching it.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default TCP connect timeout for outbound sessions.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Listener behavior configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Upper bound on how long `close()` waits for the accept loop to exit.
    pub shutdown_timeout: Duration,
    /// Disable Nagle's algorithm on accepted TCP streams.
    pub nodelay: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            nodelay: true,
        }
    }
}

/// Session behavior configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Framing limits and stream timeouts for the wrapped connection.
    pub frame: FrameConfig,
    /// Upper bound on how long `close()` waits for the receive loop to exit.
    pub shutdown_timeout: Duration,
    /// Timeout for outbound connects. `None` blocks until the OS gives up.
    pub connect_timeout: Option<Duration>,
    /// Disable Nagle's algorithm on TCP streams.
    pub nodelay: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            nodelay: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let listener = ListenerConfig::default();
        assert_eq!(listener.shutdown_timeout, DEFAULT_SHUTDOWN_TIMEOUT);
        assert!(listener.nodelay);

        let session = SessionConfig::default();
        assert_eq!(session.connect_timeout, Some(DEFAULT_CONNECT_TIMEOUT));
        assert!(session.frame.read_timeout.is_none());
    }
}
