// ABOUTME: Reachability probe used while waiting for a VM to accept SSH.
// ABOUTME: The default probe opens a TCP connection to the SSH port with a timeout.

use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;

#[async_trait]
pub trait ServerProbe: Send + Sync {
    /// Whether the server at `address` accepts SSH connections.
    async fn is_reachable(&self, address: IpAddr) -> bool;
}

/// Probe that succeeds when a TCP connection to `port` opens in time.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

#[async_trait]
impl ServerProbe for TcpProbe {
    async fn is_reachable(&self, address: IpAddr) -> bool {
        let target = SocketAddr::new(address, self.port);
        match tokio::time::timeout(self.timeout, TcpStream::connect(target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!("{} not reachable yet: {}", target, e);
                false
            }
            Err(_) => {
                tracing::debug!("{} timed out after {:?}", target, self.timeout);
                false
            }
        }
    }
}
