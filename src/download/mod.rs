use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use log::{debug, info, warn};

use crate::catalog::{ReleaseAsset, ReleaseInfo};
use crate::error::LauncherError;
use crate::networking::{DownloadBody, ReleaseApi};
use crate::progress::ProgressReporter;
use crate::store::naming::{self, VersionTag};
use crate::store::{ArtifactStore, PendingArtifact};
use crate::util::{format_speed, progress_fraction};

/// Fetches official client builds into the artifact store.
#[derive(Clone)]
pub struct ArtifactDownloader {
    api: Arc<dyn ReleaseApi>,
    store: ArtifactStore,
}

impl ArtifactDownloader {
    pub fn new(api: Arc<dyn ReleaseApi>, store: ArtifactStore) -> Self {
        Self { api, store }
    }

    /// Download this platform's build of `release`. Nothing is retried.
    pub async fn download(
        &self,
        release: &ReleaseInfo,
        progress: &ProgressReporter,
    ) -> Result<PathBuf, LauncherError> {
        let asset_not_found = || LauncherError::AssetNotFound {
            tag: release.tag.clone(),
            platform: naming::platform_suffix(),
        };
        let tag = VersionTag::parse(&release.tag).ok_or_else(asset_not_found)?;

        let assets = self.api.list_assets(release).await?;
        let asset = select_asset(&assets, &tag).ok_or_else(|| {
            warn!(
                "download: none of {} assets of {} match this platform",
                assets.len(),
                release.tag
            );
            asset_not_found()
        })?;
        info!("download: fetching {} from {}", asset.name, asset.download_url);

        let body = self.api.open_asset(asset).await?;
        let pending = self.store.begin_write(&asset.name).await?;
        let path = stream_to_file(body, pending, progress).await?;
        info!("download: stored {}", path.display());
        Ok(path)
    }
}

/// First asset carrying the official name for `tag` on this platform.
pub fn select_asset<'a>(assets: &'a [ReleaseAsset], tag: &VersionTag) -> Option<&'a ReleaseAsset> {
    assets
        .iter()
        .find(|asset| naming::parse_official_file_name(&asset.name).as_ref() == Some(tag))
}

/// Write `body` sequentially into `pending`, reporting byte progress, and commit it.
///
/// On any error `pending` is dropped, which deletes the staging file.
pub async fn stream_to_file(
    body: DownloadBody,
    mut pending: PendingArtifact,
    progress: &ProgressReporter,
) -> Result<PathBuf, LauncherError> {
    let DownloadBody { total, mut chunks } = body;
    progress.set_fraction(progress_fraction(0, total));

    let mut downloaded: u64 = 0;
    let mut last_tick = Instant::now();
    let mut last_bytes = 0u64;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        pending.write_chunk(&chunk).await?;
        downloaded += chunk.len() as u64;
        progress.set_fraction(progress_fraction(downloaded, total));

        let elapsed = last_tick.elapsed().as_secs_f32();
        if elapsed > 0.2 {
            let speed = (downloaded - last_bytes) as f32 / elapsed;
            debug!(
                "download: {} of {:?} bytes ({})",
                downloaded,
                total,
                format_speed(speed)
            );
            last_tick = Instant::now();
            last_bytes = downloaded;
        }
    }

    if let Some(total) = total
        && downloaded < total
    {
        return Err(LauncherError::Transfer(format!(
            "download incomplete: received {downloaded} of {total} bytes"
        )));
    }

    pending.commit().await
}
