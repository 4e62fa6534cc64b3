//! Utilities for spinning up a prometheus metrics server.

use crate::PrometheusError;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{IpAddr, SocketAddr, TcpListener};
use tracing::info;

/// Resolves the socket the metrics server listens on. Port `0` is replaced by a port the OS
/// assigns.
fn listen_addr(addr: IpAddr, metrics_port: u16) -> Result<SocketAddr, PrometheusError> {
    if metrics_port != 0 {
        return Ok(SocketAddr::from((addr, metrics_port)));
    }
    // PrometheusBuilder binds its own listener once this one is dropped.
    let listener = TcpListener::bind((addr, 0))?;
    Ok(listener.local_addr()?)
}

/// Installs the global prometheus recorder and starts serving it over http.
///
/// Returns the address metrics are served at.
pub fn init_prometheus_server(
    addr: IpAddr,
    metrics_port: u16,
) -> Result<SocketAddr, PrometheusError> {
    let actual_addr = listen_addr(addr, metrics_port)?;
    PrometheusBuilder::new().with_http_listener(actual_addr).install()?;

    info!(target: "prometheus", "Serving metrics at: http://{}", actual_addr);
    Ok(actual_addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_explicit_port_is_kept() {
        let addr = listen_addr(IpAddr::V4(Ipv4Addr::LOCALHOST), 9191).unwrap();
        assert_eq!(addr, SocketAddr::from((Ipv4Addr::LOCALHOST, 9191)));
    }

    #[test]
    fn test_zero_port_is_assigned() {
        let addr = listen_addr(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).unwrap();
        assert_ne!(addr.port(), 0);
    }
}
