use std::path::Path;

use anyhow::{anyhow, Result};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Serializer, Value};
use tracing::error;

use crate::model::FinderConfig;
use crate::rank::RankedResult;

/// Print a summary of the run configuration before probing.
pub fn print_config_summary(locations: &[String], config: &FinderConfig) {
	println!("IP Finder Configuration");
	println!("=======================");
	println!("Hostname:       {}", config.hostname);
	println!("Locations:      {}", locations.join(", "));
	println!("Port:           {}", config.port);
	println!("DNS timeout:    {} ms", config.dns_timeout.as_millis());
	println!("Probe timeout:  {} ms", config.probe_timeout.as_millis());
	println!("Concurrency:    {}", config.concurrency);
	if config.quality.enabled {
		println!("Quality filter: >= {}% per /24", config.quality.threshold);
	} else {
		println!("Quality filter: off");
	}
	println!();
}

/// Print the ranked addresses as a table followed by the joined and JSON forms.
pub fn print_results(result: &RankedResult) {
	let mut table = Table::new();
	table.load_preset(UTF8_FULL);
	table.set_content_arrangement(ContentArrangement::Dynamic);
	table.set_header(vec!["Rank", "IP", "RTT", "Location", "Nameserver"]);

	for (i, entry) in result.entries.iter().enumerate() {
		let (location, nameserver) = match &entry.provenance {
			Some(p) => (p.location.clone(), p.nameserver.to_string()),
			None => ("-".to_string(), "-".to_string()),
		};
		table.add_row(vec![
			format!("{}", i + 1),
			entry.ip.to_string(),
			format!("{} ms", entry.rtt_ms),
			location,
			nameserver,
		]);
	}

	let count = result.entries.len();
	println!("\n{} IPs ordered by approximate delay time (milliseconds)", count);
	println!("{table}");
	println!("\n{} IPs concatenated:", count);
	println!("{}", result.joined);
	println!("\n{} IPs in JSON format:", count);
	println!("{}", Value::from(result.ips()));
}

pub fn print_no_results() {
	println!("No available servers found");
}

/// Write the ranked addresses to a CSV file.
pub fn write_csv(path: &str, result: &RankedResult) -> Result<()> {
	let mut writer = csv::Writer::from_path(path)?;

	writer.write_record(["rank", "ip", "rtt_ms", "name", "location", "nameserver"])?;

	for (i, entry) in result.entries.iter().enumerate() {
		let (name, location, nameserver) = match &entry.provenance {
			Some(p) => (p.name.clone(), p.location.clone(), p.nameserver.to_string()),
			None => (String::new(), String::new(), String::new()),
		};
		writer.write_record([
			(i + 1).to_string(),
			entry.ip.to_string(),
			entry.rtt_ms.to_string(),
			name,
			location,
			nameserver,
		])?;
	}

	writer.flush()?;
	println!("\nResults written to: {}", path);
	Ok(())
}

/// Replace `HostMap.<key>` in an existing JSON proxy config with the IP list.
///
/// A missing file is reported and skipped; returns whether the file was written.
pub fn write_hostmap(path: &Path, key: &str, ips: &[String]) -> Result<bool> {
	if !path.is_file() {
		error!("{} does not exist", path.display());
		return Ok(false);
	}

	let content = std::fs::read_to_string(path)
		.map_err(|e| anyhow!("cannot read '{}': {}", path.display(), e))?;
	let mut config: Value = serde_json::from_str(&content)
		.map_err(|e| anyhow!("'{}' is not valid JSON: {}", path.display(), e))?;
	let root = config.as_object_mut()
		.ok_or_else(|| anyhow!("'{}' does not hold a JSON object", path.display()))?;

	let host_map = root.entry("HostMap")
		.or_insert_with(|| Value::Object(Map::new()));
	let host_map = host_map.as_object_mut()
		.ok_or_else(|| anyhow!("HostMap in '{}' is not an object", path.display()))?;
	host_map.insert(key.to_string(), Value::from(ips.to_vec()));

	// Same layout the proxy writes itself: 4-space indent, ": " separators
	let mut out = Vec::new();
	let mut ser = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
	config.serialize(&mut ser)?;
	std::fs::write(path, out)
		.map_err(|e| anyhow!("cannot write '{}': {}", path.display(), e))?;
	println!("Written into {}", path.display());
	Ok(true)
}
