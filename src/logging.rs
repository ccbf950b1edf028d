use tracing_subscriber::EnvFilter;

/// Set up logging of probe and scheduler events to stderr.
///
/// RUST_LOG overrides the default level, e.g. `RUST_LOG=ip_finder::reach=debug`
/// to see every failed handshake.
pub fn init_logging(verbose: bool) {
	let default_level = if verbose { "debug" } else { "info" };
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(default_level));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.without_time()
		.try_init()
		.ok();
}
