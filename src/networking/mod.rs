use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use log::{debug, warn};
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;

use crate::catalog::{ReleaseAsset, ReleaseInfo};
use crate::config::LauncherConfig;
use crate::error::LauncherError;

pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, LauncherError>>;

/// Response body of a binary download, consumed chunk by chunk.
pub struct DownloadBody {
    /// Expected length in bytes when the server announced one.
    pub total: Option<u64>,
    pub chunks: ChunkStream,
}

/// Remote side of the release catalog: listing releases, their assets, and fetching asset bytes.
#[async_trait]
pub trait ReleaseApi: Send + Sync {
    async fn list_releases(&self) -> Result<Vec<ReleaseInfo>, LauncherError>;

    async fn list_assets(&self, release: &ReleaseInfo) -> Result<Vec<ReleaseAsset>, LauncherError>;

    async fn open_asset(&self, asset: &ReleaseAsset) -> Result<DownloadBody, LauncherError>;
}

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    url: String,
    assets_url: String,
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    name: String,
    browser_download_url: String,
    #[serde(default)]
    size: Option<u64>,
}

/// GitHub releases API client.
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    releases_url: String,
    metadata_timeout: Duration,
    transfer_timeout: Duration,
}

impl GitHubClient {
    pub fn new(config: &LauncherConfig) -> Self {
        Self {
            client: build_client(config.metadata_timeout),
            releases_url: config.releases_url.clone(),
            metadata_timeout: config.metadata_timeout,
            transfer_timeout: config.transfer_timeout,
        }
    }
}

#[async_trait]
impl ReleaseApi for GitHubClient {
    async fn list_releases(&self) -> Result<Vec<ReleaseInfo>, LauncherError> {
        debug!("networking: GET {}", self.releases_url);
        let response = self
            .client
            .get(&self.releases_url)
            .header(ACCEPT, "application/vnd.github+json")
            .timeout(self.metadata_timeout)
            .send()
            .await
            .map_err(|e| LauncherError::catalog_from("release request failed", e))?;
        if !response.status().is_success() {
            return Err(LauncherError::Catalog(format!(
                "release list returned status {}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| LauncherError::catalog_from("release body error", e))?;
        parse_releases(&body)
    }

    async fn list_assets(&self, release: &ReleaseInfo) -> Result<Vec<ReleaseAsset>, LauncherError> {
        debug!("networking: GET {}", release.assets_url);
        let response = self
            .client
            .get(&release.assets_url)
            .header(ACCEPT, "application/vnd.github+json")
            .timeout(self.metadata_timeout)
            .send()
            .await
            .map_err(|e| LauncherError::transfer_from("asset request failed", e))?;
        if !response.status().is_success() {
            return Err(LauncherError::Transfer(format!(
                "asset list for {} returned status {}",
                release.tag,
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| LauncherError::transfer_from("asset body error", e))?;
        parse_assets(&body)
    }

    async fn open_asset(&self, asset: &ReleaseAsset) -> Result<DownloadBody, LauncherError> {
        let mut body = open_stream(&self.client, &asset.download_url, self.transfer_timeout).await?;
        body.total = body.total.or(asset.size);
        Ok(body)
    }
}

/// HTTP client with the launcher's user agent and a bounded connect phase.
pub fn build_client(connect_timeout: Duration) -> Client {
    Client::builder()
        .user_agent(concat!("aos-launcher/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(connect_timeout)
        .build()
        .unwrap_or_else(|err| {
            warn!("networking: falling back to default HTTP client configuration ({err})");
            Client::new()
        })
}

/// Start a GET for binary content; the whole transfer is bounded by `timeout`.
pub async fn open_stream(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<DownloadBody, LauncherError> {
    debug!("networking: streaming {url}");
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| LauncherError::transfer_from("download request failed", e))?
        .error_for_status()
        .map_err(|e| LauncherError::transfer_from("download status error", e))?;
    let total = response.content_length();
    let chunks = response
        .bytes_stream()
        .map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| LauncherError::transfer_from("stream error", e))
        })
        .boxed();
    Ok(DownloadBody { total, chunks })
}

/// Parse the release-list payload. Non-object entries and unpublished drafts are skipped.
pub fn parse_releases(body: &str) -> Result<Vec<ReleaseInfo>, LauncherError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(body)
        .map_err(|e| LauncherError::catalog_from("release list parse error", e))?;
    let mut releases = Vec::with_capacity(entries.len());
    for entry in entries {
        if !entry.is_object() {
            continue;
        }
        let release: GitHubRelease = serde_json::from_value(entry)
            .map_err(|e| LauncherError::catalog_from("release entry parse error", e))?;
        let Some(published_at) = release.published_at else {
            debug!("networking: skipping unpublished release {}", release.tag_name);
            continue;
        };
        releases.push(ReleaseInfo {
            tag: release.tag_name,
            metadata_url: release.url,
            assets_url: release.assets_url,
            published_at,
        });
    }
    Ok(releases)
}

pub fn parse_assets(body: &str) -> Result<Vec<ReleaseAsset>, LauncherError> {
    let assets: Vec<GitHubAsset> = serde_json::from_str(body)
        .map_err(|e| LauncherError::transfer_from("asset list parse error", e))?;
    Ok(assets
        .into_iter()
        .map(|asset| ReleaseAsset {
            name: asset.name,
            download_url: asset.browser_download_url,
            size: asset.size,
        })
        .collect())
}
