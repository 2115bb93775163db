use std::time::Duration;

use async_trait::async_trait;
use tokio::{net::TcpStream, time::timeout};
use tracing::debug;
use url::Url;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Consulted before every login attempt.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

pub struct AlwaysReachable;

#[async_trait]
impl ReachabilityProbe for AlwaysReachable {
    async fn is_reachable(&self) -> bool {
        true
    }
}

/// Reports the service reachable when a TCP connection to its host opens.
pub struct TcpReachabilityProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpReachabilityProbe {
    pub fn for_url(url: &Url) -> Option<Self> {
        Some(Self {
            host: url.host_str()?.to_string(),
            port: url.port_or_known_default()?,
            timeout: DEFAULT_PROBE_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ReachabilityProbe for TcpReachabilityProbe {
    async fn is_reachable(&self) -> bool {
        let target = (self.host.as_str(), self.port);
        match timeout(self.timeout, TcpStream::connect(target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                debug!(host = %self.host, port = self.port, "reachability: connect failed: {err}");
                false
            }
            Err(_) => {
                debug!(host = %self.host, port = self.port, "reachability: connect timed out");
                false
            }
        }
    }
}
