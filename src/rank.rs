use std::net::Ipv4Addr;

use crate::model::{Provenance, Reachable, ResolvedTable};

/// Separator used for the single-line IP list handed to proxy configs
pub const IP_SEPARATOR: &str = "|";

/// One ranked address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
	pub ip: Ipv4Addr,
	pub rtt_ms: u64,
	pub provenance: Option<Provenance>,
}

/// Reachable addresses fastest first, plus the joined form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedResult {
	pub entries: Vec<RankedEntry>,
	pub joined: String,
}

impl RankedResult {
	pub fn ips(&self) -> Vec<String> {
		self.entries.iter().map(|e| e.ip.to_string()).collect()
	}
}

/// Sort by RTT ascending, keeping insertion order for equal RTTs.
///
/// Returns `None` when there is nothing to rank.
pub fn rank(mut reachable: Vec<Reachable>, resolved: &ResolvedTable) -> Option<RankedResult> {
	if reachable.is_empty() {
		return None;
	}
	reachable.sort_by_key(|r| r.rtt_ms);

	let entries: Vec<RankedEntry> = reachable.into_iter()
		.map(|r| RankedEntry {
			ip: r.ip,
			rtt_ms: r.rtt_ms,
			provenance: resolved.get(&r.ip).cloned(),
		})
		.collect();
	let joined = entries.iter()
		.map(|e| e.ip.to_string())
		.collect::<Vec<_>>()
		.join(IP_SEPARATOR);

	Some(RankedResult { entries, joined })
}
