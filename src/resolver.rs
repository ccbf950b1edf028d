use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::error::FinderError;
use crate::model::Nameserver;

/// Location tag for nameservers given directly on the command line
pub const CLI_LOCATION: &str = "cli";

/// Location name that expands to every list a source knows about
pub const ALL_LOCATIONS: &str = "all";

/// Parse a nameserver address string.
///
/// Supports formats:
///   "1.1.1.1"              -- IPv4, default port 53
///   "1.1.1.1:53"           -- IPv4 with explicit port
///   "2606:4700::1111"      -- bare IPv6, default port 53
///   "[2606:4700::1111]:53" -- bracketed IPv6 with port
pub fn parse_nameserver(input: &str, location: &str) -> Result<Nameserver, FinderError> {
	let trimmed = input.trim();
	let invalid = |reason: String| FinderError::InvalidNameserver {
		input: trimmed.to_string(),
		reason,
	};
	if trimmed.is_empty() {
		return Err(invalid("empty address".to_string()));
	}

	let addr: SocketAddr = if trimmed.starts_with('[') {
		trimmed.parse().map_err(|e| invalid(format!("{}", e)))?
	} else if trimmed.contains("::") || trimmed.matches(':').count() > 1 {
		let ip = trimmed.parse().map_err(|e| invalid(format!("{}", e)))?;
		SocketAddr::new(ip, 53)
	} else if let Ok(addr) = trimmed.parse::<SocketAddr>() {
		addr
	} else {
		let ip = trimmed.parse().map_err(|e| invalid(format!("{}", e)))?;
		SocketAddr::new(ip, 53)
	};

	Ok(Nameserver {
		addr,
		location: location.to_string(),
	})
}

/// Provides candidate nameservers per location.
///
/// The pipeline only sees this trait, so lists can come from files, flags or
/// anything else.
pub trait NameserverSource {
	/// Every location this source can list.
	fn locations(&self) -> Result<Vec<String>, FinderError>;

	/// Candidate nameservers for one location.
	fn candidates(&self, location: &str) -> Result<Vec<Nameserver>, FinderError>;
}

/// Expand `all` into every known location; other names pass through.
pub fn expand_locations(
	source: &dyn NameserverSource,
	locations: &[String],
) -> Result<Vec<String>, FinderError> {
	if locations.iter().any(|l| l == ALL_LOCATIONS) {
		source.locations()
	} else {
		Ok(locations.to_vec())
	}
}

/// Path of the list file for `location` inside `dir`.
///
/// Location names are plain file stems; anything that could point outside
/// `dir` is rejected.
pub fn list_file(dir: &Path, location: &str) -> Result<PathBuf, FinderError> {
	let escapes = location.is_empty()
		|| location == "."
		|| location == ".."
		|| location.contains(['/', '\\'])
		|| Path::new(location).is_absolute();
	if escapes {
		return Err(FinderError::InvalidLocation(location.to_string()));
	}
	Ok(dir.join(format!("{}.txt", location)))
}

/// Lists stored as `<dir>/<location>.txt`, whitespace separated.
///
/// Each list is shuffled and cut to `max_per_location` entries so that a run
/// samples the large lists instead of always probing the same head.
pub struct DirectorySource {
	dir: PathBuf,
	max_per_location: usize,
	seed: Option<u64>,
}

impl DirectorySource {
	pub fn new(dir: impl Into<PathBuf>, max_per_location: usize, seed: Option<u64>) -> Self {
		DirectorySource {
			dir: dir.into(),
			max_per_location,
			seed,
		}
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn list_path(&self, location: &str) -> Result<PathBuf, FinderError> {
		list_file(&self.dir, location)
	}

	/// Pick one known location at random.
	pub fn random_location(&self) -> Result<String, FinderError> {
		let locations = self.locations()?;
		let mut rng = self.rng();
		locations.choose(&mut rng)
			.cloned()
			.ok_or_else(|| FinderError::NoLocations(self.dir.clone()))
	}

	fn rng(&self) -> StdRng {
		match self.seed {
			Some(seed) => StdRng::seed_from_u64(seed),
			None => StdRng::from_entropy(),
		}
	}
}

impl NameserverSource for DirectorySource {
	fn locations(&self) -> Result<Vec<String>, FinderError> {
		let entries = std::fs::read_dir(&self.dir).map_err(|source| FinderError::Source {
			path: self.dir.clone(),
			source,
		})?;
		let mut locations: Vec<String> = entries
			.filter_map(|entry| entry.ok())
			.map(|entry| entry.path())
			.filter(|path| path.extension().is_some_and(|ext| ext == "txt"))
			.filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
			.collect();
		locations.sort();
		Ok(locations)
	}

	fn candidates(&self, location: &str) -> Result<Vec<Nameserver>, FinderError> {
		let path = self.list_path(location)?;
		info!("reading servers from file {}", path.display());
		let content = std::fs::read_to_string(&path)
			.map_err(|source| FinderError::Source { path: path.clone(), source })?;

		let mut servers = Vec::new();
		for entry in content.split_whitespace() {
			match parse_nameserver(entry, location) {
				Ok(server) => servers.push(server),
				Err(e) => warn!("skipping entry in {}: {}", path.display(), e),
			}
		}

		servers.shuffle(&mut self.rng());
		servers.truncate(self.max_per_location);
		Ok(servers)
	}
}

/// A fixed list, e.g. from `--resolver` flags.
pub struct StaticSource {
	nameservers: Vec<Nameserver>,
}

impl StaticSource {
	pub fn new(nameservers: Vec<Nameserver>) -> Self {
		StaticSource { nameservers }
	}
}

impl NameserverSource for StaticSource {
	fn locations(&self) -> Result<Vec<String>, FinderError> {
		let mut locations: Vec<String> = self.nameservers.iter()
			.map(|n| n.location.clone())
			.collect();
		locations.sort();
		locations.dedup();
		Ok(locations)
	}

	fn candidates(&self, location: &str) -> Result<Vec<Nameserver>, FinderError> {
		Ok(self.nameservers.iter()
			.filter(|n| n.location == location)
			.cloned()
			.collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_ipv4_no_port() {
		let n = parse_nameserver("1.1.1.1", "us").unwrap();
		assert_eq!(n.addr.port(), 53);
		assert_eq!(n.addr.ip().to_string(), "1.1.1.1");
		assert_eq!(n.location, "us");
	}

	#[test]
	fn test_ipv4_with_port() {
		let n = parse_nameserver("8.8.8.8:5353", "us").unwrap();
		assert_eq!(n.addr.port(), 5353);
		assert_eq!(n.addr.ip().to_string(), "8.8.8.8");
	}

	#[test]
	fn test_ipv6_bare() {
		let n = parse_nameserver("2606:4700::1111", "us").unwrap();
		assert_eq!(n.addr.port(), 53);
	}

	#[test]
	fn test_ipv6_bracketed() {
		let n = parse_nameserver("[2606:4700::1111]:53", "us").unwrap();
		assert_eq!(n.addr.port(), 53);
	}

	#[test]
	fn test_invalid_input() {
		assert!(parse_nameserver("not-an-ip", "us").is_err());
		assert!(parse_nameserver("   ", "us").is_err());
		assert!(parse_nameserver("300.1.1.1", "us").is_err());
	}

	#[test]
	fn test_directory_source_reads_and_samples() {
		let dir = tempfile::tempdir().unwrap();
		let list: Vec<String> = (1..=20).map(|n| format!("10.0.0.{}", n)).collect();
		std::fs::write(dir.path().join("kr.txt"), list.join("\n")).unwrap();
		std::fs::write(dir.path().join("us.txt"), "8.8.8.8 bogus\n\t9.9.9.9\n").unwrap();
		std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();

		let source = DirectorySource::new(dir.path(), 5, Some(7));
		assert_eq!(source.locations().unwrap(), vec!["kr", "us"]);

		let kr = source.candidates("kr").unwrap();
		assert_eq!(kr.len(), 5);
		assert!(kr.iter().all(|n| n.location == "kr"));

		let us = source.candidates("us").unwrap();
		assert_eq!(us.len(), 2, "invalid entries are skipped");
	}

	#[test]
	fn test_directory_source_same_seed_same_sample() {
		let dir = tempfile::tempdir().unwrap();
		let list: Vec<String> = (1..=50).map(|n| format!("10.0.1.{}", n)).collect();
		std::fs::write(dir.path().join("jp.txt"), list.join(" ")).unwrap();

		let a = DirectorySource::new(dir.path(), 10, Some(42)).candidates("jp").unwrap();
		let b = DirectorySource::new(dir.path(), 10, Some(42)).candidates("jp").unwrap();
		assert_eq!(a, b);
	}

	#[test]
	fn test_missing_list_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let source = DirectorySource::new(dir.path(), 10, None);
		let err = source.candidates("zz").unwrap_err();
		assert!(matches!(err, FinderError::Source { .. }));
		assert!(matches!(source.random_location(), Err(FinderError::NoLocations(_))));
	}

	#[test]
	fn test_expand_all_locations() {
		let source = StaticSource::new(vec![
			parse_nameserver("1.1.1.1", "us").unwrap(),
			parse_nameserver("2.2.2.2", "kr").unwrap(),
			parse_nameserver("3.3.3.3", "us").unwrap(),
		]);
		let all = expand_locations(&source, &["all".to_string()]).unwrap();
		assert_eq!(all, vec!["kr", "us"]);
		let named = expand_locations(&source, &["us".to_string()]).unwrap();
		assert_eq!(named, vec!["us"]);
		assert_eq!(source.candidates("us").unwrap().len(), 2);
	}

	#[test]
	fn test_location_names_stay_inside_the_directory() {
		let dir = Path::new("dns_servers");
		assert_eq!(list_file(dir, "kr").unwrap(), dir.join("kr.txt"));
		for bad in ["../x", "a/b", "a\\b", "..", ".", "", "/etc/passwd"] {
			assert!(
				matches!(list_file(dir, bad), Err(FinderError::InvalidLocation(_))),
				"{:?} accepted", bad,
			);
		}
	}

	#[test]
	fn test_directory_source_rejects_traversal() {
		let dir = tempfile::tempdir().unwrap();
		let inner = dir.path().join("lists");
		std::fs::create_dir(&inner).unwrap();
		std::fs::write(dir.path().join("outside.txt"), "1.1.1.1\n").unwrap();

		let source = DirectorySource::new(&inner, 10, None);
		let err = source.candidates("../outside").unwrap_err();
		assert!(matches!(err, FinderError::InvalidLocation(_)));
	}
}
