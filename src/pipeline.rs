use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use tokio_rustls::TlsConnector;
use tracing::info;

use crate::dns;
use crate::error::FinderError;
use crate::model::{FinderConfig, Nameserver, Provenance, Reachable, ResolvedTable};
use crate::quality;
use crate::rank::{rank, RankedResult};
use crate::reach;
use crate::resolver::{expand_locations, NameserverSource};
use crate::scheduler::{lock, run_all};

/// Terminal result of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	Ranked(RankedResult),
	/// Nothing survived: no candidates, nothing resolved, or nothing reachable
	NoResults,
}

/// Resolves a hostname through many nameservers and keeps the addresses
/// that actually serve it over TLS.
pub struct Finder {
	config: FinderConfig,
	connector: TlsConnector,
}

impl Finder {
	pub fn new(config: FinderConfig) -> Result<Self, FinderError> {
		let connector = reach::tls_connector()?;
		Ok(Finder::with_connector(config, connector))
	}

	/// Use a connector with its own trust roots instead of the webpki set.
	pub fn with_connector(config: FinderConfig, connector: TlsConnector) -> Self {
		Finder { config, connector }
	}

	pub fn config(&self) -> &FinderConfig {
		&self.config
	}

	/// Run both probing phases for the given locations and rank the survivors.
	///
	/// Only failing to obtain the candidate list is an error. An empty list
	/// ends the run with `NoResults` before any packet is sent.
	pub async fn run(
		&self,
		source: &dyn NameserverSource,
		locations: &[String],
	) -> Result<Outcome, FinderError> {
		let nameservers = candidates(source, locations)?;
		if nameservers.is_empty() {
			info!("no candidate nameservers for {:?}", locations);
			return Ok(Outcome::NoResults);
		}

		info!("looking up {} from {} nameservers", self.config.hostname, nameservers.len());
		let resolved = self.lookup(nameservers).await;
		info!("{} unique addresses resolved", resolved.len());

		let reachable = self.check_service(&resolved).await;
		info!("{} of {} addresses passed the TLS check", reachable.len(), resolved.len());

		let reachable = if self.config.quality.enabled {
			let before = reachable.len();
			let kept = quality::filter(resolved.keys(), &reachable, self.config.quality.threshold);
			info!(
				"quality filter dropped {} address(es) below {}% prefix success",
				before - kept.len(), self.config.quality.threshold
			);
			kept
		} else {
			reachable
		};

		Ok(match rank(reachable, &resolved) {
			Some(ranked) => Outcome::Ranked(ranked),
			None => Outcome::NoResults,
		})
	}

	/// Phase 1: query every nameserver once and merge the answers.
	pub async fn lookup(&self, nameservers: Vec<Nameserver>) -> ResolvedTable {
		let hostname: Arc<str> = Arc::from(self.config.hostname.as_str());
		let blocklist: Arc<[String]> = Arc::from(self.config.blocklist.as_slice());
		let timeout = self.config.dns_timeout;

		run_all(nameservers, self.config.concurrency, |server, sink: Arc<Mutex<ResolvedTable>>| {
			let hostname = hostname.clone();
			let blocklist = blocklist.clone();
			async move {
				let addrs = dns::resolve(&hostname, server.addr, timeout, &blocklist).await;
				if addrs.is_empty() {
					return;
				}
				let mut table = lock(&sink);
				for ip in addrs {
					table.insert(ip, Provenance {
						name: hostname.to_string(),
						nameserver: server.addr.ip(),
						location: server.location.clone(),
					});
				}
			}
		}).await
	}

	/// Phase 2: TLS-check every resolved address against the name it was
	/// resolved for.
	pub async fn check_service(&self, resolved: &ResolvedTable) -> Vec<Reachable> {
		let mut targets: Vec<(Ipv4Addr, String)> = resolved.iter()
			.map(|(ip, provenance)| (*ip, provenance.name.clone()))
			.collect();
		targets.sort();

		let port = self.config.port;
		let timeout = self.config.probe_timeout;
		let connector = self.connector.clone();

		run_all(targets, self.config.concurrency, |(ip, name), sink: Arc<Mutex<Vec<Reachable>>>| {
			let connector = connector.clone();
			async move {
				if let Some(rtt_ms) = reach::check(ip, &name, port, timeout, &connector).await {
					lock(&sink).push(Reachable { ip, rtt_ms });
				}
			}
		}).await
	}
}

/// Collect candidates for every requested location; any source failure aborts.
fn candidates(
	source: &dyn NameserverSource,
	locations: &[String],
) -> Result<Vec<Nameserver>, FinderError> {
	let mut nameservers = Vec::new();
	for location in expand_locations(source, locations)? {
		nameservers.extend(source.candidates(&location)?);
	}
	Ok(nameservers)
}
