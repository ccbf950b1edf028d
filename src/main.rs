mod cli;
mod dns;
mod download;
mod error;
mod logging;
mod model;
mod output;
mod pipeline;
mod quality;
mod rank;
mod reach;
mod resolver;
mod scheduler;

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use crate::cli::Cli;
use crate::download::DownloadConfig;
use crate::model::{FinderConfig, DEFAULT_BLOCKLIST};
use crate::pipeline::{Finder, Outcome};
use crate::quality::QualityPolicy;
use crate::resolver::{
	parse_nameserver, DirectorySource, NameserverSource, StaticSource, CLI_LOCATION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let dir_source = DirectorySource::new(&cli.dns_dir, cli.max_servers, cli.seed);

	// Update mode: refresh the list files and stop
	if cli.update {
		let locations = download::locations_to_update(&dir_source, &cli.locations)?;
		let config = DownloadConfig {
			proxy: cli.proxy.clone(),
			..DownloadConfig::default()
		};
		let updated = download::update_lists(dir_source.dir(), &locations, &config).await?;
		info!("finished, {}/{} lists updated", updated.len(), locations.len());
		return Ok(());
	}

	let blocklist = if cli.no_blocklist {
		Vec::new()
	} else if !cli.block.is_empty() {
		cli.block.clone()
	} else {
		DEFAULT_BLOCKLIST.iter().map(|s| s.to_string()).collect()
	};
	let config = FinderConfig {
		hostname: cli.hostname.clone(),
		dns_timeout: Duration::from_millis(cli.dns_timeout),
		probe_timeout: Duration::from_millis(cli.timeout),
		port: cli.port,
		concurrency: cli.concurrency,
		quality: QualityPolicy {
			enabled: !cli.no_quality_filter,
			threshold: cli.threshold,
		},
		blocklist,
	};

	// Nameservers from flags take precedence over the list files
	let (source, locations): (Box<dyn NameserverSource>, Vec<String>) = if !cli.resolvers.is_empty() {
		let servers = cli.resolvers.iter()
			.map(|r| parse_nameserver(r, CLI_LOCATION))
			.collect::<Result<Vec<_>, _>>()?;
		(Box::new(StaticSource::new(servers)), vec![CLI_LOCATION.to_string()])
	} else if cli.locations.is_empty() {
		let location = dir_source.random_location()?;
		info!("no location given, using randomly chosen {}", location);
		(Box::new(dir_source), vec![location])
	} else {
		(Box::new(dir_source), cli.locations.clone())
	};

	let finder = Finder::new(config)?;
	output::print_config_summary(&locations, finder.config());

	match finder.run(source.as_ref(), &locations).await? {
		Outcome::Ranked(result) => {
			output::print_results(&result);
			if let Some(path) = &cli.output {
				output::write_csv(path, &result)?;
			}
			if let Some(path) = &cli.hostmap {
				output::write_hostmap(Path::new(path), &cli.hostmap_key, &result.ips())?;
			}
		}
		Outcome::NoResults => output::print_no_results(),
	}

	Ok(())
}
