//! In-memory release API for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use futures_util::stream;

use crate::catalog::{ReleaseAsset, ReleaseInfo};
use crate::error::LauncherError;
use crate::networking::{DownloadBody, ReleaseApi};

const CHUNK: usize = 4;

/// Fixed instant `days` days after 2022-08-01.
pub fn ts(days: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 8, 1, 0, 0, 0)
        .single()
        .expect("valid fixture date")
        + chrono::Duration::days(days)
}

pub fn release(tag: &str, published_at: DateTime<Utc>) -> ReleaseInfo {
    ReleaseInfo {
        tag: tag.to_owned(),
        metadata_url: format!("https://example.invalid/releases/{tag}"),
        assets_url: format!("https://example.invalid/releases/{tag}/assets"),
        published_at,
    }
}

#[derive(Default)]
pub struct FakeReleaseApi {
    releases: Vec<ReleaseInfo>,
    assets: Mutex<HashMap<String, Vec<ReleaseAsset>>>,
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    listing_delay: Option<Duration>,
    failing_listings: AtomicUsize,
    break_next_transfer: AtomicBool,
    hide_total: bool,
    release_calls: AtomicUsize,
    asset_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

impl FakeReleaseApi {
    pub fn new(releases: Vec<ReleaseInfo>) -> Self {
        Self {
            releases,
            ..Self::default()
        }
    }

    pub fn with_listing_delay(mut self, delay: Duration) -> Self {
        self.listing_delay = Some(delay);
        self
    }

    /// Fail the next `count` release-list calls.
    pub fn failing_listings(self, count: usize) -> Self {
        self.failing_listings.store(count, Ordering::SeqCst);
        self
    }

    pub fn without_content_length(mut self) -> Self {
        self.hide_total = true;
        self
    }

    /// Attach an asset named `name` with `payload` to the release tagged `tag`.
    pub fn with_asset(self, tag: &str, name: &str, payload: &[u8]) -> Self {
        let url = format!("https://example.invalid/download/{tag}/{name}");
        self.assets
            .lock()
            .expect("fixture lock")
            .entry(format!("https://example.invalid/releases/{tag}/assets"))
            .or_default()
            .push(ReleaseAsset {
                name: name.to_owned(),
                download_url: url.clone(),
                size: Some(payload.len() as u64),
            });
        self.payloads
            .lock()
            .expect("fixture lock")
            .insert(url, payload.to_vec());
        self
    }

    /// Make the next transfer fail after its first chunk.
    pub fn break_next_transfer(&self) {
        self.break_next_transfer.store(true, Ordering::SeqCst);
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub fn asset_calls(&self) -> usize {
        self.asset_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn network_calls(&self) -> usize {
        self.release_calls() + self.asset_calls() + self.download_calls()
    }
}

#[async_trait]
impl ReleaseApi for FakeReleaseApi {
    async fn list_releases(&self) -> Result<Vec<ReleaseInfo>, LauncherError> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.listing_delay {
            tokio::time::sleep(delay).await;
        }
        let should_fail = self
            .failing_listings
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(LauncherError::Catalog("release list returned status 503".into()));
        }
        Ok(self.releases.clone())
    }

    async fn list_assets(&self, release: &ReleaseInfo) -> Result<Vec<ReleaseAsset>, LauncherError> {
        self.asset_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .assets
            .lock()
            .expect("fixture lock")
            .get(&release.assets_url)
            .cloned()
            .unwrap_or_default())
    }

    async fn open_asset(&self, asset: &ReleaseAsset) -> Result<DownloadBody, LauncherError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let payload = self
            .payloads
            .lock()
            .expect("fixture lock")
            .get(&asset.download_url)
            .cloned()
            .ok_or_else(|| LauncherError::Transfer("download status error: 404".into()))?;
        let total = (!self.hide_total).then_some(payload.len() as u64);
        let mut chunks: Vec<Result<Vec<u8>, LauncherError>> =
            payload.chunks(CHUNK).map(|c| Ok(c.to_vec())).collect();
        if self.break_next_transfer.swap(false, Ordering::SeqCst) {
            chunks.truncate(1);
            chunks.push(Err(LauncherError::Transfer(
                "stream error: connection reset".into(),
            )));
        }
        Ok(DownloadBody {
            total,
            chunks: stream::iter(chunks).boxed(),
        })
    }
}
