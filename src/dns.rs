use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{anyhow, Result};
use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::{Name, RData, RecordType};
use tokio::net::UdpSocket;
use tracing::debug;

/// DNS response information extracted from a parsed message
#[derive(Debug)]
pub struct DnsResponse {
	pub rcode: ResponseCode,
	/// Addresses from the A records of the answer section
	pub addrs: Vec<Ipv4Addr>,
}

/// Build a recursive A query for the given hostname.
///
/// Returns the serialized query bytes ready to send over UDP.
pub fn build_query(hostname: &str, txid: u16) -> Result<Vec<u8>> {
	let name = Name::from_ascii(hostname)
		.map_err(|e| anyhow!("invalid hostname '{}': {}", hostname, e))?;

	let mut message = Message::new();
	message.set_id(txid);
	message.set_recursion_desired(true);
	message.add_query(Query::query(name, RecordType::A));

	let bytes = message.to_vec()
		.map_err(|e| anyhow!("failed to serialize DNS query: {}", e))?;
	Ok(bytes)
}

/// Parse a DNS response, validating the transaction ID and collecting A records.
///
/// Returns an error if the response cannot be parsed or the txid does not match.
pub fn parse_response(bytes: &[u8], expected_txid: u16) -> Result<DnsResponse> {
	let message = Message::from_vec(bytes)
		.map_err(|e| anyhow!("failed to parse DNS response: {}", e))?;

	if message.id() != expected_txid {
		return Err(anyhow!(
			"txid mismatch: expected {}, got {}",
			expected_txid, message.id()
		));
	}

	if message.message_type() != MessageType::Response {
		return Err(anyhow!("received a query instead of a response"));
	}

	let addrs = message.answers().iter()
		.filter_map(|record| match record.data() {
			RData::A(a) => Some(a.0),
			_ => None,
		})
		.collect();

	Ok(DnsResponse {
		rcode: message.response_code(),
		addrs,
	})
}

/// True if the address falls in one of the blocklisted ranges.
///
/// Entries are prefixes of the dotted form and should end with a dot
/// ("66.249.") so that "66.24" cannot match "66.249.1.1" by accident.
pub fn is_blocked(ip: Ipv4Addr, blocklist: &[String]) -> bool {
	let dotted = ip.to_string();
	blocklist.iter().any(|prefix| dotted.starts_with(prefix.as_str()))
}

/// Resolve `hostname` through a single nameserver.
///
/// Never fails: timeouts, socket errors, error rcodes and garbage responses
/// all produce an empty list. Blocklisted addresses are dropped.
pub async fn resolve(
	hostname: &str,
	nameserver: SocketAddr,
	timeout: Duration,
	blocklist: &[String],
) -> Vec<Ipv4Addr> {
	match query_a(hostname, nameserver, timeout).await {
		Ok(addrs) => {
			let total = addrs.len();
			let accepted: Vec<Ipv4Addr> = addrs.into_iter()
				.filter(|ip| !is_blocked(*ip, blocklist))
				.collect();
			debug!(
				%nameserver, accepted = accepted.len(), blocked = total - accepted.len(),
				"resolved {}", hostname
			);
			accepted
		}
		Err(e) => {
			debug!(%nameserver, "lookup of {} failed: {}", hostname, e);
			Vec::new()
		}
	}
}

/// Send one A query and wait for its answer until the deadline.
///
/// Datagrams that fail to parse or carry another txid are skipped; the query
/// itself is sent exactly once.
async fn query_a(
	hostname: &str,
	nameserver: SocketAddr,
	timeout: Duration,
) -> Result<Vec<Ipv4Addr>> {
	let txid: u16 = rand::random();
	let query_bytes = build_query(hostname, txid)?;

	// Bind a dedicated socket so concurrent probes never see each other's answers
	let bind_addr = if nameserver.is_ipv4() {
		"0.0.0.0:0"
	} else {
		"[::]:0"
	};
	let socket = UdpSocket::bind(bind_addr).await?;
	socket.send_to(&query_bytes, nameserver).await?;

	let deadline = tokio::time::Instant::now() + timeout;
	let mut buf = vec![0u8; 4096];
	loop {
		let (len, _src) = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf))
			.await
			.map_err(|_| anyhow!("timed out after {} ms", timeout.as_millis()))??;

		let response = match parse_response(&buf[..len], txid) {
			Ok(response) => response,
			Err(e) => {
				debug!(%nameserver, "ignoring datagram: {}", e);
				continue;
			}
		};
		if response.rcode != ResponseCode::NoError {
			return Err(anyhow!("server answered {}", response.rcode));
		}
		return Ok(response.addrs);
	}
}
