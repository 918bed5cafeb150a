use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::catalog::ReleaseCatalog;
use crate::download::ArtifactDownloader;
use crate::error::LauncherError;
use crate::progress::ProgressReporter;
use crate::store::naming::VersionTag;
use crate::store::{ArtifactKind, ArtifactStore};

/// What a user typed to pick a client build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionIdentifier {
    /// `vMAJOR.MINOR.PATCH`: an official release, downloaded when missing.
    Tagged(VersionTag),
    /// Anything else: a file already in the store.
    Literal(String),
}

impl VersionIdentifier {
    pub fn parse(input: &str) -> Self {
        match VersionTag::parse(input) {
            Some(tag) => Self::Tagged(tag),
            None => Self::Literal(input.to_owned()),
        }
    }
}

impl fmt::Display for VersionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tagged(tag) => fmt::Display::fmt(tag, f),
            Self::Literal(stem) => f.write_str(stem),
        }
    }
}

/// An existing client file and the identifier it satisfies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactLocation {
    path: PathBuf,
    identifier: VersionIdentifier,
}

impl ArtifactLocation {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn identifier(&self) -> &VersionIdentifier {
        &self.identifier
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionOrigin {
    /// Published in the remote catalog.
    Remote,
    /// Only present as a local file.
    Local,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvailableVersion {
    pub name: String,
    pub origin: VersionOrigin,
    /// A matching file is already in the store.
    pub installed: bool,
}

/// Turns version identifiers into local client files.
#[derive(Clone)]
pub struct VersionResolver {
    catalog: ReleaseCatalog,
    store: ArtifactStore,
    downloader: ArtifactDownloader,
}

impl VersionResolver {
    pub fn new(catalog: ReleaseCatalog, store: ArtifactStore) -> Self {
        let downloader = ArtifactDownloader::new(catalog.api(), store.clone());
        Self {
            catalog,
            store,
            downloader,
        }
    }

    pub fn catalog(&self) -> &ReleaseCatalog {
        &self.catalog
    }

    pub async fn resolve(
        &self,
        identifier: &str,
        progress: &ProgressReporter,
    ) -> Result<ArtifactLocation, LauncherError> {
        let identifier = VersionIdentifier::parse(identifier);
        let path = match &identifier {
            VersionIdentifier::Tagged(tag) => self.resolve_tagged(tag, progress).await?,
            VersionIdentifier::Literal(stem) => self
                .store
                .find_literal(stem)
                .await?
                .ok_or_else(|| LauncherError::not_found(stem.as_str()))?,
        };
        debug!("resolve: {} -> {}", identifier, path.display());
        Ok(ArtifactLocation { path, identifier })
    }

    async fn resolve_tagged(
        &self,
        tag: &VersionTag,
        progress: &ProgressReporter,
    ) -> Result<PathBuf, LauncherError> {
        if let Some(path) = self.store.find_tagged(tag).await? {
            debug!("resolve: {} already in store", tag);
            return Ok(path);
        }

        let _progress = progress.begin(format!("Downloading client {tag}..."));
        info!("resolve: {} not in store, looking up release", tag);
        let release = self
            .catalog
            .get_release(tag.as_str())
            .await?
            .ok_or_else(|| LauncherError::not_found(tag.as_str()))?;
        self.downloader.download(&release, progress).await
    }

    /// Remote tags in catalog order, then local-only builds sorted by name.
    pub async fn available_versions(&self) -> Result<Vec<AvailableVersion>, LauncherError> {
        let releases = self.catalog.releases().await?;
        let artifacts = self.store.list().await?;

        let installed_tags: HashSet<&str> = artifacts
            .iter()
            .filter_map(|artifact| match &artifact.kind {
                ArtifactKind::Official(tag) => Some(tag.as_str()),
                ArtifactKind::Custom(_) => None,
            })
            .collect();

        let mut versions: Vec<AvailableVersion> = releases
            .iter()
            .map(|release| AvailableVersion {
                name: release.tag.clone(),
                origin: VersionOrigin::Remote,
                installed: installed_tags.contains(release.tag.as_str()),
            })
            .collect();

        let mut local: Vec<&str> = artifacts
            .iter()
            .map(|artifact| artifact.version_name())
            .collect();
        local.sort_unstable();
        local.dedup();

        let mut seen: HashSet<String> = versions.iter().map(|v| v.name.clone()).collect();
        for name in local {
            if seen.insert(name.to_owned()) {
                versions.push(AvailableVersion {
                    name: name.to_owned(),
                    origin: VersionOrigin::Local,
                    installed: true,
                });
            }
        }
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::store::naming;
    use crate::testing::{FakeReleaseApi, release, ts};

    fn tag(text: &str) -> VersionTag {
        VersionTag::parse(text).expect("tag should parse")
    }

    fn resolver_with(api: Arc<FakeReleaseApi>, dir: &Path) -> VersionResolver {
        VersionResolver::new(ReleaseCatalog::new(api), ArtifactStore::new(dir))
    }

    fn scenario_api() -> FakeReleaseApi {
        FakeReleaseApi::new(vec![release("v2.0.0", ts(10)), release("v1.9.0", ts(9))])
            .with_asset(
                "v1.9.0",
                &naming::official_file_name(&tag("v1.9.0")),
                b"v1.9.0 client",
            )
            .with_asset(
                "v2.0.0",
                &naming::official_file_name(&tag("v2.0.0")),
                b"v2.0.0 client",
            )
    }

    #[test]
    fn classifies_identifiers() {
        assert_eq!(
            VersionIdentifier::parse("v1.2.3"),
            VersionIdentifier::Tagged(tag("v1.2.3"))
        );
        assert_eq!(
            VersionIdentifier::parse("my-custom-build"),
            VersionIdentifier::Literal("my-custom-build".into())
        );
    }

    #[tokio::test]
    async fn cached_tag_resolves_without_network() {
        let temp = tempfile::tempdir().expect("temporary directory should be created");
        let file = temp.path().join(naming::official_file_name(&tag("v1.9.0")));
        std::fs::write(&file, b"cached").expect("fixture");
        let api = Arc::new(scenario_api());
        let resolver = resolver_with(api.clone(), temp.path());

        let location = resolver
            .resolve("v1.9.0", &ProgressReporter::new())
            .await
            .expect("cached tag should resolve");
        assert_eq!(location.path(), file);
        assert_eq!(api.network_calls(), 0);
    }

    #[tokio::test]
    async fn missing_tag_downloads_once() {
        let temp = tempfile::tempdir().expect("temporary directory should be created");
        let api = Arc::new(scenario_api());
        let resolver = resolver_with(api.clone(), temp.path());
        let progress = ProgressReporter::new();

        let location = resolver
            .resolve("v1.9.0", &progress)
            .await
            .expect("download should succeed");

        assert_eq!(
            location.path().file_name().and_then(|n| n.to_str()),
            Some(naming::official_file_name(&tag("v1.9.0")).as_str())
        );
        assert_eq!(location.identifier(), &VersionIdentifier::Tagged(tag("v1.9.0")));
        assert_eq!(api.release_calls(), 1);
        assert_eq!(api.asset_calls(), 1);
        assert_eq!(api.download_calls(), 1);
        assert!(!progress.snapshot().active);

        resolver
            .resolve("v1.9.0", &progress)
            .await
            .expect("second resolve hits the store");
        assert_eq!(api.network_calls(), 3);
    }

    #[tokio::test]
    async fn unknown_tag_is_not_found_after_catalog_call() {
        let temp = tempfile::tempdir().expect("temporary directory should be created");
        let api = Arc::new(scenario_api());
        let resolver = resolver_with(api.clone(), temp.path());
        let progress = ProgressReporter::new();

        let err = resolver
            .resolve("v9.9.9", &progress)
            .await
            .expect_err("tag does not exist");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(api.release_calls(), 1);
        assert_eq!(api.asset_calls(), 0);
        assert_eq!(api.download_calls(), 0);
        assert!(!progress.snapshot().active);
    }

    #[tokio::test]
    async fn failed_transfer_resets_progress_and_retries_cleanly() {
        let temp = tempfile::tempdir().expect("temporary directory should be created");
        let api = Arc::new(scenario_api());
        api.break_next_transfer();
        let resolver = resolver_with(api.clone(), temp.path());
        let progress = ProgressReporter::new();

        let err = resolver
            .resolve("v2.0.0", &progress)
            .await
            .expect_err("transfer should break");
        assert_eq!(err.kind(), ErrorKind::Transfer);
        assert!(!progress.snapshot().active);
        assert!(
            !temp
                .path()
                .join(naming::official_file_name(&tag("v2.0.0")))
                .exists()
        );

        let location = resolver
            .resolve("v2.0.0", &progress)
            .await
            .expect("retry should succeed");
        assert_eq!(std::fs::read(location.path()).expect("read"), b"v2.0.0 client");
    }

    #[tokio::test]
    async fn catalog_failure_surfaces_and_resets_progress() {
        let temp = tempfile::tempdir().expect("temporary directory should be created");
        let api = Arc::new(scenario_api().failing_listings(1));
        let resolver = resolver_with(api, temp.path());
        let progress = ProgressReporter::new();

        let err = resolver
            .resolve("v2.0.0", &progress)
            .await
            .expect_err("catalog is down");
        assert_eq!(err.kind(), ErrorKind::Catalog);
        assert!(!progress.snapshot().active);
    }

    #[tokio::test]
    async fn literal_stem_resolves_local_jar_without_network() {
        let temp = tempfile::tempdir().expect("temporary directory should be created");
        let jar = temp.path().join("my-custom-build.jar");
        std::fs::write(&jar, b"custom").expect("fixture");
        let api = Arc::new(scenario_api());
        let resolver = resolver_with(api.clone(), temp.path());

        let location = resolver
            .resolve("my-custom-build", &ProgressReporter::new())
            .await
            .expect("literal should resolve");
        assert_eq!(location.path(), jar);
        assert_eq!(api.network_calls(), 0);

        let err = resolver
            .resolve("not-there", &ProgressReporter::new())
            .await
            .expect_err("no such file");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(api.network_calls(), 0);
    }

    #[tokio::test]
    async fn lists_remote_then_local_only_versions() {
        let temp = tempfile::tempdir().expect("temporary directory should be created");
        for name in [
            naming::official_file_name(&tag("v1.9.0")),
            naming::official_file_name(&tag("v1.5.0")),
            "zeta-build.jar".to_string(),
            "alpha-build.jar".to_string(),
        ] {
            std::fs::write(temp.path().join(name), b"x").expect("fixture");
        }
        let resolver = resolver_with(Arc::new(scenario_api()), temp.path());

        let versions = resolver
            .available_versions()
            .await
            .expect("listing should succeed");
        let summary: Vec<(&str, VersionOrigin, bool)> = versions
            .iter()
            .map(|v| (v.name.as_str(), v.origin, v.installed))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("v2.0.0", VersionOrigin::Remote, false),
                ("v1.9.0", VersionOrigin::Remote, true),
                ("alpha-build", VersionOrigin::Local, true),
                ("v1.5.0", VersionOrigin::Local, true),
                ("zeta-build", VersionOrigin::Local, true),
            ]
        );
    }
}
