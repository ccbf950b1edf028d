use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::{error, info};

use crate::error::FinderError;
use crate::resolver::{expand_locations, list_file, NameserverSource};
use crate::scheduler::{lock, run_all};

/// Where public-dns.info publishes its per-country resolver lists
pub const DEFAULT_BASE_URL: &str = "http://public-dns.info/nameserver";

/// Settings for refreshing the on-disk nameserver lists
#[derive(Debug, Clone)]
pub struct DownloadConfig {
	pub base_url: String,
	pub timeout: Duration,
	pub concurrency: usize,
	/// HTTP(S) proxy for reaching the list host, e.g. "http://127.0.0.1:8087".
	/// Proxy environment variables are ignored when this is unset.
	pub proxy: Option<String>,
}

impl Default for DownloadConfig {
	fn default() -> Self {
		DownloadConfig {
			base_url: DEFAULT_BASE_URL.to_string(),
			timeout: Duration::from_secs(5),
			concurrency: 50,
			proxy: None,
		}
	}
}

pub fn list_url(base_url: &str, location: &str) -> String {
	format!("{}/{}.txt", base_url.trim_end_matches('/'), location)
}

/// Locations to refresh: the named ones with `all` expanded, or every list
/// already on disk when none are named.
pub fn locations_to_update(
	source: &dyn NameserverSource,
	requested: &[String],
) -> Result<Vec<String>, FinderError> {
	if requested.is_empty() {
		source.locations()
	} else {
		expand_locations(source, requested)
	}
}

/// Download `<location>.txt` for every location into `dir`.
///
/// Failed downloads are logged and leave the existing file untouched.
/// Returns the locations that were updated, sorted.
pub async fn update_lists(
	dir: &Path,
	locations: &[String],
	config: &DownloadConfig,
) -> Result<Vec<String>> {
	let jobs = locations.iter()
		.map(|location| Ok((
			location.clone(),
			list_url(&config.base_url, location),
			list_file(dir, location)?,
		)))
		.collect::<Result<Vec<(String, String, PathBuf)>, FinderError>>()?;

	let mut builder = reqwest::Client::builder().timeout(config.timeout);
	if let Some(proxy) = &config.proxy {
		let proxy = reqwest::Proxy::all(proxy.as_str())
			.map_err(|e| anyhow!("invalid proxy '{}': {}", proxy, e))?;
		builder = builder.proxy(proxy);
	} else {
		builder = builder.no_proxy();
	}
	let client = builder.build()?;
	std::fs::create_dir_all(dir)
		.map_err(|e| anyhow!("cannot create '{}': {}", dir.display(), e))?;

	let mut updated = run_all(jobs, config.concurrency, |(location, url, path), sink: Arc<Mutex<Vec<String>>>| {
		let client = client.clone();
		async move {
			info!("downloading file {}", url);
			match download(&client, &url, &path).await {
				Ok(count) => {
					info!("{} servers written to {}", count, path.display());
					lock(&sink).push(location);
				}
				Err(e) => error!("cannot({}) update file {}", e, path.display()),
			}
		}
	}).await;
	updated.sort();
	Ok(updated)
}

async fn download(client: &reqwest::Client, url: &str, path: &Path) -> Result<usize> {
	let body = client.get(url).send().await?
		.error_for_status()?
		.text().await?;
	tokio::fs::write(path, &body).await?;
	Ok(body.split_whitespace().count())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tokio::io::{AsyncReadExt, AsyncWriteExt};
	use tokio::net::TcpListener;

	use crate::resolver::DirectorySource;

	/// Minimal HTTP/1.1 server: `/nameserver/kr.txt` has a body, anything else is 404.
	async fn list_server() -> String {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			while let Ok((mut stream, _)) = listener.accept().await {
				tokio::spawn(async move {
					let mut buf = vec![0u8; 4096];
					let n = stream.read(&mut buf).await.unwrap_or(0);
					let request = String::from_utf8_lossy(&buf[..n]);
					let response = if request.starts_with("GET /nameserver/kr.txt ") {
						let body = "1.1.1.1\n8.8.8.8\n9.9.9.9\n";
						format!(
							"HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
							body.len(), body,
						)
					} else {
						"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
					};
					let _ = stream.write_all(response.as_bytes()).await;
				});
			}
		});
		format!("http://{}/nameserver", addr)
	}

	#[test]
	fn test_list_url() {
		assert_eq!(list_url(DEFAULT_BASE_URL, "kr"), "http://public-dns.info/nameserver/kr.txt");
		assert_eq!(list_url("http://host/x/", "us"), "http://host/x/us.txt");
	}

	#[tokio::test]
	async fn test_update_writes_lists_and_skips_failures() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("zz.txt"), "4.4.4.4\n").unwrap();
		let config = DownloadConfig {
			base_url: list_server().await,
			..DownloadConfig::default()
		};

		let updated = update_lists(
			dir.path(), &["kr".to_string(), "zz".to_string()], &config,
		).await.unwrap();

		assert_eq!(updated, vec!["kr".to_string()]);
		let kr = std::fs::read_to_string(dir.path().join("kr.txt")).unwrap();
		assert_eq!(kr.split_whitespace().count(), 3);
		let zz = std::fs::read_to_string(dir.path().join("zz.txt")).unwrap();
		assert_eq!(zz, "4.4.4.4\n", "failed download keeps the old list");
	}

	#[test]
	fn test_locations_to_update() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("kr.txt"), "").unwrap();
		std::fs::write(dir.path().join("us.txt"), "").unwrap();
		let source = DirectorySource::new(dir.path(), 10, None);

		let all = locations_to_update(&source, &["all".to_string()]).unwrap();
		assert_eq!(all, vec!["kr", "us"]);
		let none_named = locations_to_update(&source, &[]).unwrap();
		assert_eq!(none_named, vec!["kr", "us"]);
		let named = locations_to_update(&source, &["jp".to_string()]).unwrap();
		assert_eq!(named, vec!["jp"]);
	}

	#[tokio::test]
	async fn test_update_all_refreshes_every_list() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("kr.txt"), "4.4.4.4\n").unwrap();
		std::fs::write(dir.path().join("zz.txt"), "5.5.5.5\n").unwrap();
		let source = DirectorySource::new(dir.path(), 10, None);
		let config = DownloadConfig {
			base_url: list_server().await,
			..DownloadConfig::default()
		};

		let locations = locations_to_update(&source, &["all".to_string()]).unwrap();
		let updated = update_lists(dir.path(), &locations, &config).await.unwrap();

		assert_eq!(updated, vec!["kr".to_string()]);
		assert!(!dir.path().join("all.txt").exists());
		let kr = std::fs::read_to_string(dir.path().join("kr.txt")).unwrap();
		assert_eq!(kr.split_whitespace().count(), 3);
	}

	#[tokio::test]
	async fn test_update_rejects_location_outside_dir() {
		let dir = tempfile::tempdir().unwrap();
		let lists = dir.path().join("lists");
		let config = DownloadConfig {
			base_url: list_server().await,
			..DownloadConfig::default()
		};

		let result = update_lists(&lists, &["../x".to_string()], &config).await;
		assert!(result.is_err());
		assert!(!dir.path().join("x.txt").exists());
		assert!(!lists.exists(), "nothing is created for a rejected location");
	}
}
