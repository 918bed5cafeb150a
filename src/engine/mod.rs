use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::mpsc;

use crate::catalog::ReleaseCatalog;
use crate::config::LauncherConfig;
use crate::engine::models::{Profile, Server};
use crate::engine::state::LaunchState;
use crate::env::AppDirs;
use crate::error::LauncherError;
use crate::jre::RuntimeValidator;
use crate::networking::{GitHubClient, ReleaseApi};
use crate::process::{GameExit, ProcessSupervisor};
use crate::progress::ProgressReporter;
use crate::resolver::VersionResolver;
use crate::store::ArtifactStore;

pub mod models;
pub mod state;

/// Wires the launcher core together and runs play requests.
pub struct LauncherEngine {
    dirs: AppDirs,
    runtime: RuntimeValidator,
    resolver: VersionResolver,
    supervisor: ProcessSupervisor,
    progress: ProgressReporter,
}

impl LauncherEngine {
    pub fn new(config: &LauncherConfig, api: Arc<dyn ReleaseApi>) -> Self {
        let catalog = ReleaseCatalog::new(api);
        let store = ArtifactStore::new(config.dirs.versions_dir());
        debug!("engine: client builds live in {}", store.dir().display());
        Self {
            dirs: config.dirs.clone(),
            runtime: RuntimeValidator::new(config),
            resolver: VersionResolver::new(catalog, store),
            supervisor: ProcessSupervisor::new(),
            progress: ProgressReporter::new(),
        }
    }

    /// Engine talking to the GitHub releases API configured in `config`.
    pub fn from_config(config: &LauncherConfig) -> Self {
        Self::new(config, Arc::new(GitHubClient::new(config)))
    }

    #[cfg(test)]
    pub fn with_supervisor(mut self, supervisor: ProcessSupervisor) -> Self {
        self.supervisor = supervisor;
        self
    }

    pub fn dirs(&self) -> &AppDirs {
        &self.dirs
    }

    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    pub fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }

    pub fn runtime(&self) -> &RuntimeValidator {
        &self.runtime
    }

    /// Version the profile asks for, or the newest published release.
    pub async fn client_version(&self, profile: &Profile) -> Result<String, LauncherError> {
        if let Some(version) = profile.client_version.as_deref().map(str::trim)
            && !version.is_empty()
        {
            return Ok(version.to_owned());
        }
        let latest = self
            .resolver
            .catalog()
            .latest()
            .await?
            .ok_or_else(|| LauncherError::not_found("latest"))?;
        info!("play: no client version on profile {}, using {}", profile.name, latest.tag);
        Ok(latest.tag)
    }

    /// Prepare runtime and client build concurrently, then run the game to completion.
    ///
    /// Every step is reported on `updates`; the outcome is also returned.
    pub async fn play(
        &self,
        profile: &Profile,
        server: &Server,
        updates: &mpsc::UnboundedSender<LaunchState>,
    ) -> Result<GameExit, LauncherError> {
        let result = self.try_play(profile, server, updates).await;
        let state = match &result {
            Ok(exit) => {
                info!("play: game finished with code {}", exit.code);
                LaunchState::Exited { code: exit.code }
            }
            Err(err) => {
                error!("play: {err}");
                LaunchState::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        };
        updates.send(state).ok();
        result
    }

    async fn try_play(
        &self,
        profile: &Profile,
        server: &Server,
        updates: &mpsc::UnboundedSender<LaunchState>,
    ) -> Result<GameExit, LauncherError> {
        let version = self.client_version(profile).await?;
        updates
            .send(LaunchState::Preparing {
                version: version.clone(),
            })
            .ok();
        info!("play: preparing {} for profile {}", version, profile.name);

        let (java, artifact) = tokio::try_join!(
            self.runtime.ensure_runtime(&self.progress),
            self.resolver.resolve(&version, &self.progress)
        )?;

        updates.send(LaunchState::Playing { version }).ok();
        self.supervisor
            .run(profile, server, &java, artifact.path())
            .await
    }

    /// Install the runtime without launching anything.
    pub async fn prepare_runtime(&self) -> Result<PathBuf, LauncherError> {
        self.runtime.ensure_runtime(&self.progress).await
    }
}
