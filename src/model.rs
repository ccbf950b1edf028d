use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::quality::QualityPolicy;

/// A candidate DNS resolver, not yet known to answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nameserver {
	pub addr: SocketAddr,
	/// Region tag the server was listed under (e.g. "kr", "us", "cli")
	pub location: String,
}

/// Where a resolved address came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
	pub name: String,
	pub nameserver: IpAddr,
	pub location: String,
}

/// Resolved IPv4 address -> provenance, last writer wins on duplicates
pub type ResolvedTable = HashMap<Ipv4Addr, Provenance>;

/// An address that completed the TLS check, with its measured round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reachable {
	pub ip: Ipv4Addr,
	pub rtt_ms: u64,
}

/// First three octets of an IPv4 address.
///
/// Addresses sharing a prefix are assumed to share fate (same subnet or
/// operator), so the quality filter buckets its statistics by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddressPrefix(pub [u8; 3]);

impl From<Ipv4Addr> for AddressPrefix {
	fn from(ip: Ipv4Addr) -> Self {
		let [a, b, c, _] = ip.octets();
		AddressPrefix([a, b, c])
	}
}

impl fmt::Display for AddressPrefix {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let [a, b, c] = self.0;
		write!(f, "{}.{}.{}", a, b, c)
	}
}

/// Address ranges that answer for Google names but never serve the target
/// over TLS. Matched as string prefixes of the dotted address.
pub const DEFAULT_BLOCKLIST: &[&str] = &[
	"64.18.", "64.233.", "66.102.", "66.249.", "72.14.", "74.125.",
	"173.194.", "207.126.", "209.85.", "216.58.", "216.239.",
];

/// Finder configuration, passed explicitly into every phase
#[derive(Debug, Clone)]
pub struct FinderConfig {
	pub hostname: String,
	pub dns_timeout: Duration,
	pub probe_timeout: Duration,
	pub port: u16,
	pub concurrency: usize,
	pub quality: QualityPolicy,
	pub blocklist: Vec<String>,
}

impl Default for FinderConfig {
	fn default() -> Self {
		FinderConfig {
			hostname: "google.com".to_string(),
			dns_timeout: Duration::from_secs(5),
			probe_timeout: Duration::from_secs(5),
			port: 443,
			concurrency: 100,
			quality: QualityPolicy::default(),
			blocklist: DEFAULT_BLOCKLIST.iter().map(|s| s.to_string()).collect(),
		}
	}
}
