use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;

use crate::model::{AddressPrefix, Reachable};

/// Whether and how strictly to prune subnets that mostly fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPolicy {
	pub enabled: bool,
	/// Minimum per-prefix success rate in percent (0-100)
	pub threshold: u8,
}

impl Default for QualityPolicy {
	fn default() -> Self {
		QualityPolicy { enabled: true, threshold: 80 }
	}
}

/// Success and failure counts for one prefix
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
	success: u32,
	fail: u32,
}

/// Compute the success rate of every prefix present in the attempted set.
///
/// rate = 100 * success / (success + fail), truncated. Prefixes where nothing
/// succeeded get 0. Reachable entries outside the attempted set are ignored.
pub fn success_rates<'a>(
	attempted: impl IntoIterator<Item = &'a Ipv4Addr>,
	reachable: &[Reachable],
) -> BTreeMap<AddressPrefix, u8> {
	let reached: HashSet<Ipv4Addr> = reachable.iter().map(|r| r.ip).collect();
	let mut tallies: BTreeMap<AddressPrefix, Tally> = BTreeMap::new();

	for ip in attempted {
		let tally = tallies.entry(AddressPrefix::from(*ip)).or_default();
		if reached.contains(ip) {
			tally.success += 1;
		} else {
			tally.fail += 1;
		}
	}

	tallies.into_iter()
		.map(|(prefix, t)| {
			let rate = 100 * u64::from(t.success) / u64::from(t.success + t.fail);
			(prefix, rate as u8)
		})
		.collect()
}

/// Drop reachable addresses whose subnet falls below `threshold` percent.
///
/// A single lucky probe in a mostly dead /24 is treated as noise. Order of the
/// surviving entries is preserved.
pub fn filter<'a>(
	attempted: impl IntoIterator<Item = &'a Ipv4Addr>,
	reachable: &[Reachable],
	threshold: u8,
) -> Vec<Reachable> {
	let rates = success_rates(attempted, reachable);
	reachable.iter()
		// Prefixes missing from the table never saw a success and always go
		.filter(|r| {
			rates.get(&AddressPrefix::from(r.ip))
				.is_some_and(|rate| *rate >= threshold)
		})
		.copied()
		.collect()
}
