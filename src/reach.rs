use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::error::FinderError;

/// Build the TLS connector shared by every reachability probe in a run.
///
/// Certificates are verified against the Mozilla roots from webpki-roots with
/// the ring provider; nothing is read from the system trust store.
pub fn tls_connector() -> Result<TlsConnector, FinderError> {
	let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
	tls_connector_with_roots(roots)
}

/// Build a connector that trusts only `roots`.
pub fn tls_connector_with_roots(roots: RootCertStore) -> Result<TlsConnector, FinderError> {
	let provider = Arc::new(rustls::crypto::ring::default_provider());
	let config = ClientConfig::builder_with_provider(provider)
		.with_safe_default_protocol_versions()?
		.with_root_certificates(roots)
		.with_no_client_auth();
	Ok(TlsConnector::from(Arc::new(config)))
}

/// Check that `ip` serves TLS for `hostname` and measure its round trip.
///
/// Two connections are made: the first completes a verified TLS handshake,
/// the second is a bare TCP connect whose duration becomes the RTT (floor of
/// milliseconds). Each is bounded by `timeout`. Any failure returns `None`.
pub async fn check(
	ip: Ipv4Addr,
	hostname: &str,
	port: u16,
	timeout: Duration,
	connector: &TlsConnector,
) -> Option<u64> {
	let addr = SocketAddr::from((ip, port));

	match tokio::time::timeout(timeout, handshake(addr, hostname, connector)).await {
		Ok(Ok(())) => {}
		Ok(Err(e)) => {
			debug!(%addr, "TLS check failed: {}", e);
			return None;
		}
		Err(_) => {
			debug!(%addr, "TLS check timed out after {} ms", timeout.as_millis());
			return None;
		}
	}

	let start = Instant::now();
	match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
		Ok(Ok(_stream)) => {
			let rtt_ms = start.elapsed().as_millis() as u64;
			debug!(%addr, rtt_ms, "reachable");
			Some(rtt_ms)
		}
		Ok(Err(e)) => {
			debug!(%addr, "timing connect failed: {}", e);
			None
		}
		Err(_) => {
			debug!(%addr, "timing connect timed out");
			None
		}
	}
}

async fn handshake(addr: SocketAddr, hostname: &str, connector: &TlsConnector) -> Result<()> {
	let server_name = ServerName::try_from(hostname.to_string())
		.map_err(|e| anyhow!("invalid server name '{}': {}", hostname, e))?;
	let stream = TcpStream::connect(addr).await
		.map_err(|e| anyhow!("TCP: {}", e))?;
	connector.connect(server_name, stream).await
		.map_err(|e| anyhow!("TLS: {}", e))?;
	Ok(())
}
