//! Saves call recordings to the downloads directory.
//!
//! Remote URLs are streamed into `<name>.part` and renamed once complete, so
//! an interrupted download never leaves a file that looks finished.  Local
//! paths and `file://` URLs are copied.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use calldesk_proto::config::DownloadConfig;
use calldesk_proto::DownloadRequest;
use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {status}")]
    Status { status: reqwest::StatusCode },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported recording URL: {0}")]
    UnsupportedUrl(String),

    #[error("refusing to save as {0:?}: not a plain file name")]
    InvalidFileName(String),
}

#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    dir: PathBuf,
}

impl Downloader {
    pub fn new(dir: PathBuf, config: &DownloadConfig) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fetch the recording and return where it was written.
    pub async fn save(&self, request: &DownloadRequest) -> Result<PathBuf, DownloadError> {
        if !is_plain_file_name(&request.file_name) {
            return Err(DownloadError::InvalidFileName(request.file_name.clone()));
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        let target = self.dir.join(&request.file_name);

        let url = request.url.as_str();
        if url.starts_with("http://") || url.starts_with("https://") {
            self.fetch(url, &target).await?;
        } else if let Some(source) = local_source(url) {
            debug!("download: copying {}", source.display());
            tokio::fs::copy(&source, &target).await?;
        } else {
            return Err(DownloadError::UnsupportedUrl(request.url.clone()));
        }

        info!("download: saved {} to {}", request.url, target.display());
        Ok(target)
    }

    async fn fetch(&self, url: &str, target: &Path) -> Result<(), DownloadError> {
        debug!("download: GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status { status });
        }

        let mut part_name = target.as_os_str().to_owned();
        part_name.push(".part");
        let part = PathBuf::from(part_name);

        let written = match stream_to_file(response, &part).await {
            Ok(n) => n,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&part, target).await?;
        debug!("download: {} bytes from {}", written, url);
        Ok(())
    }
}

async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<u64, DownloadError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Exactly one normal path component, so the target stays inside the
/// downloads directory.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn local_source(url: &str) -> Option<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if url.contains("://") {
        return None;
    }
    Some(PathBuf::from(url))
}
