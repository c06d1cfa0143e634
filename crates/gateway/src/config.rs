use std::net::SocketAddr;
use std::time::Duration;

/// Default tolerance between a request's timestamp and the gateway clock.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct Config {
    // Listen address
    pub listen_addr: SocketAddr,
    // log level for http tracing
    pub log_level: tracing::Level,
    // How far a signed timestamp may drift from now, either direction
    pub freshness_window: Duration,
}

impl Config {
    pub fn new(listen_addr: SocketAddr) -> Self {
        tracing::info!("Creating gateway Config: listen_addr={}", listen_addr);
        Self {
            listen_addr,
            log_level: tracing::Level::INFO,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
        }
    }

    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }
}
