use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a run. Individual probe failures never end up here.
#[derive(Debug, Error)]
pub enum FinderError {
	#[error("invalid nameserver address '{input}': {reason}")]
	InvalidNameserver { input: String, reason: String },

	#[error("cannot read nameserver list '{}': {source}", path.display())]
	Source {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid location name '{0}'")]
	InvalidLocation(String),

	#[error("no nameserver lists found in '{}'", .0.display())]
	NoLocations(PathBuf),

	#[error("failed to build TLS client configuration: {0}")]
	Tls(#[from] rustls::Error),
}
