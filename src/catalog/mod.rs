use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use log::{debug, info, warn};

use crate::error::LauncherError;
use crate::networking::ReleaseApi;

/// One published client release.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub tag: String,
    pub metadata_url: String,
    pub assets_url: String,
    pub published_at: DateTime<Utc>,
}

/// A downloadable file attached to a release.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
    pub size: Option<u64>,
}

/// Releases ordered newest first, unique by tag.
pub type Releases = Arc<[ReleaseInfo]>;

type SharedFetch = Shared<BoxFuture<'static, Result<Releases, LauncherError>>>;

enum CacheState {
    Empty,
    Loading(SharedFetch),
    Loaded(Releases),
}

/// Process-lifetime cache of the remote release list.
///
/// The first caller starts the fetch; everyone arriving while it is in flight
/// awaits the same future. A failed fetch leaves the cache empty so the next
/// call starts over. A successful one is kept until the process exits.
#[derive(Clone)]
pub struct ReleaseCatalog {
    api: Arc<dyn ReleaseApi>,
    state: Arc<Mutex<CacheState>>,
}

impl ReleaseCatalog {
    pub fn new(api: Arc<dyn ReleaseApi>) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(CacheState::Empty)),
        }
    }

    pub fn api(&self) -> Arc<dyn ReleaseApi> {
        Arc::clone(&self.api)
    }

    pub async fn releases(&self) -> Result<Releases, LauncherError> {
        let fetch = {
            let mut state = lock(&self.state);
            match &*state {
                CacheState::Loaded(releases) => return Ok(Arc::clone(releases)),
                CacheState::Loading(fetch) => {
                    debug!("catalog: joining in-flight release fetch");
                    fetch.clone()
                }
                CacheState::Empty => {
                    let fetch = self.start_fetch();
                    *state = CacheState::Loading(fetch.clone());
                    fetch
                }
            }
        };
        fetch.await
    }

    pub async fn get_release(&self, tag: &str) -> Result<Option<ReleaseInfo>, LauncherError> {
        Ok(self
            .releases()
            .await?
            .iter()
            .find(|release| release.tag == tag)
            .cloned())
    }

    /// Most recently published release, if any exist.
    pub async fn latest(&self) -> Result<Option<ReleaseInfo>, LauncherError> {
        Ok(self.releases().await?.first().cloned())
    }

    #[cfg(test)]
    pub fn is_loaded(&self) -> bool {
        matches!(&*lock(&self.state), CacheState::Loaded(_))
    }

    fn start_fetch(&self) -> SharedFetch {
        info!("catalog: fetching release list");
        let api = Arc::clone(&self.api);
        let state = Arc::clone(&self.state);
        async move {
            let result = api
                .list_releases()
                .await
                .map(|releases| Releases::from(order_releases(releases)));
            let mut guard = lock(&state);
            match &result {
                Ok(releases) => {
                    info!("catalog: loaded {} releases", releases.len());
                    *guard = CacheState::Loaded(Arc::clone(releases));
                }
                Err(err) => {
                    warn!("catalog: release fetch failed: {err}");
                    *guard = CacheState::Empty;
                }
            }
            result
        }
        .boxed()
        .shared()
    }
}

/// Newest first; the first occurrence of a tag wins.
fn order_releases(mut releases: Vec<ReleaseInfo>) -> Vec<ReleaseInfo> {
    releases.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    let mut seen = HashSet::new();
    releases.retain(|release| seen.insert(release.tag.clone()));
    releases
}

fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
