use clap::Parser;

/// Find reachable TLS endpoint IPs through public DNS resolvers
#[derive(Parser, Debug)]
#[command(name = "ip-finder")]
#[command(about = "Resolve a hostname through many public DNS resolvers and rank the IPs that serve it over TLS")]
pub struct Cli {
	/// Locations to read nameservers for (e.g. kr us), or "all".
	/// A random location is used when none is given.
	pub locations: Vec<String>,

	/// Hostname to resolve and verify certificates against
	#[arg(short = 'H', long = "hostname", default_value = "google.com")]
	pub hostname: String,

	/// Nameserver address to use instead of the list files (repeatable)
	#[arg(short = 'r', long = "resolver")]
	pub resolvers: Vec<String>,

	/// Directory holding <location>.txt nameserver lists
	#[arg(short = 'd', long = "dns-dir", default_value = "dns_servers")]
	pub dns_dir: String,

	/// Download fresh nameserver lists instead of probing
	#[arg(long = "update")]
	pub update: bool,

	/// Proxy for downloading nameserver lists
	#[arg(long = "proxy")]
	pub proxy: Option<String>,

	/// Maximum nameservers sampled from each location's list
	#[arg(long = "max-servers", default_value = "800")]
	pub max_servers: usize,

	/// Maximum concurrent probes
	#[arg(short = 'c', long = "concurrency", default_value = "100")]
	pub concurrency: usize,

	/// DNS query timeout in milliseconds
	#[arg(long = "dns-timeout", default_value = "5000")]
	pub dns_timeout: u64,

	/// TLS check timeout in milliseconds
	#[arg(short = 't', long = "timeout", default_value = "5000")]
	pub timeout: u64,

	/// Service port to check
	#[arg(short = 'p', long = "port", default_value = "443")]
	pub port: u16,

	/// Minimum success rate (percent) of an address's /24 to keep it
	#[arg(long = "threshold", default_value = "80",
		value_parser = clap::value_parser!(u8).range(0..=100))]
	pub threshold: u8,

	/// Keep every reachable address regardless of its subnet's success rate
	#[arg(long = "no-quality-filter")]
	pub no_quality_filter: bool,

	/// Replace the built-in blocklist of address prefixes (repeatable, e.g. "66.249.")
	#[arg(long = "block")]
	pub block: Vec<String>,

	/// Disable the blocklist entirely
	#[arg(long = "no-blocklist")]
	pub no_blocklist: bool,

	/// Output CSV file path
	#[arg(short = 'o', long = "output")]
	pub output: Option<String>,

	/// JSON proxy config whose HostMap entry is replaced with the result
	#[arg(long = "hostmap")]
	pub hostmap: Option<String>,

	/// HostMap key to replace
	#[arg(long = "hostmap-key", default_value = "google_hk")]
	pub hostmap_key: String,

	/// Random seed for reproducible nameserver sampling
	#[arg(short = 's', long = "seed")]
	pub seed: Option<u64>,

	/// Log every probe
	#[arg(short = 'v', long = "verbose")]
	pub verbose: bool,
}
