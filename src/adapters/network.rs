//! Connectivity probe adapter.
//!
//! Implements [`ConnectivityProbe`] by opening a TCP connection to a
//! well-known host and port (Google DNS over TCP by default).  Names go
//! through the platform resolver first (lwIP on ESP-IDF, the OS on the
//! host).  Only a completed handshake counts, so a numeric address that
//! parses without touching the network still has to answer.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;

use crate::app::ports::ConnectivityProbe;
use crate::config::DeviceConfig;

pub struct TcpProbe {
    host: heapless::String<64>,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: heapless::String<64>, port: u16, timeout: Duration) -> Self {
        Self {
            host,
            port,
            timeout,
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(
            config.probe_host.clone(),
            config.probe_port,
            Duration::from_millis(u64::from(config.probe_timeout_ms)),
        )
    }

    fn connect(&self, addr: &SocketAddr) -> bool {
        match TcpStream::connect_timeout(addr, self.timeout) {
            Ok(_) => true,
            Err(e) => {
                debug!("Probe connect to {} failed: {}", addr, e);
                false
            }
        }
    }
}

impl ConnectivityProbe for TcpProbe {
    fn is_connected(&mut self) -> bool {
        match (self.host.as_str(), self.port).to_socket_addrs() {
            Ok(mut addrs) => addrs.any(|addr| self.connect(&addr)),
            Err(e) => {
                debug!("Probe lookup of {} failed: {}", self.host, e);
                false
            }
        }
    }
}
