use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::TempPath;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

use crate::error::LauncherError;

pub mod naming;

use naming::VersionTag;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Official build for the running platform.
    Official(VersionTag),
    /// Any other `.jar`, known by its stem.
    Custom(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredArtifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

impl StoredArtifact {
    /// Name a user would type to select this artifact.
    pub fn version_name(&self) -> &str {
        match &self.kind {
            ArtifactKind::Official(tag) => tag.as_str(),
            ArtifactKind::Custom(stem) => stem,
        }
    }
}

/// Directory of client builds, downloaded or placed there by hand.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every client build currently in the store. A missing directory is an empty store.
    pub async fn list(&self) -> Result<Vec<StoredArtifact>, LauncherError> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || scan_dir(&dir))
            .await
            .map_err(|e| LauncherError::Io {
                kind: std::io::ErrorKind::Other,
                message: format!("artifact scan task failed: {e}"),
            })?
    }

    pub async fn find_tagged(&self, tag: &VersionTag) -> Result<Option<PathBuf>, LauncherError> {
        let found = self
            .list()
            .await?
            .into_iter()
            .find(|artifact| matches!(&artifact.kind, ArtifactKind::Official(t) if t == tag))
            .map(|artifact| artifact.path);
        debug!("store: tagged lookup {} -> {:?}", tag, found);
        Ok(found)
    }

    /// Exact file match for `stem`, then `stem.jar`.
    pub async fn find_literal(&self, stem: &str) -> Result<Option<PathBuf>, LauncherError> {
        if !is_plain_file_name(stem) {
            warn!("store: refusing lookup of non-plain name {stem:?}");
            return Ok(None);
        }
        let candidates = [
            self.dir.join(stem),
            self.dir
                .join(format!("{stem}.{}", naming::ARTIFACT_EXTENSION)),
        ];
        for candidate in candidates {
            match fs::metadata(&candidate).await {
                Ok(meta) if meta.is_file() => return Ok(Some(candidate)),
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(None)
    }

    /// Open a hidden staging file that becomes `file_name` only on [`PendingArtifact::commit`].
    pub async fn begin_write(&self, file_name: &str) -> Result<PendingArtifact, LauncherError> {
        if !is_plain_file_name(file_name) {
            return Err(LauncherError::Transfer(format!(
                "refusing to write artifact named {file_name:?}"
            )));
        }
        fs::create_dir_all(&self.dir).await?;
        let staged = tempfile::Builder::new()
            .prefix(&format!(".{file_name}."))
            .suffix(".part")
            .tempfile_in(&self.dir)?;
        let (file, temp) = staged.into_parts();
        debug!("store: staging {} at {}", file_name, temp.display());
        Ok(PendingArtifact {
            file: fs::File::from_std(file),
            temp,
            dest: self.dir.join(file_name),
        })
    }
}

/// An artifact being written. Dropping it without committing deletes the staging file.
#[derive(Debug)]
pub struct PendingArtifact {
    file: fs::File,
    temp: TempPath,
    dest: PathBuf,
}

impl PendingArtifact {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), LauncherError> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| LauncherError::transfer_from("write error", e))
    }

    #[cfg(test)]
    pub fn staging_path(&self) -> &Path {
        &self.temp
    }

    /// Flush and atomically move the staged file to its final name.
    pub async fn commit(mut self) -> Result<PathBuf, LauncherError> {
        self.file
            .flush()
            .await
            .map_err(|e| LauncherError::transfer_from("flush error", e))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| LauncherError::transfer_from("sync error", e))?;
        let Self { file, temp, dest } = self;
        drop(file);
        temp.persist(&dest)
            .map_err(|e| LauncherError::transfer_from("failed to finalize artifact", e.error))?;
        Ok(dest)
    }
}

fn scan_dir(dir: &Path) -> Result<Vec<StoredArtifact>, LauncherError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut artifacts = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| LauncherError::Io {
            kind: e
                .io_error()
                .map_or(std::io::ErrorKind::Other, std::io::Error::kind),
            message: format!("failed to list {}: {e}", dir.display()),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let kind = if let Some(tag) = naming::parse_official_file_name(name) {
            ArtifactKind::Official(tag)
        } else if let Some(stem) = naming::artifact_stem(name) {
            ArtifactKind::Custom(stem.to_owned())
        } else {
            continue;
        };
        artifacts.push(StoredArtifact {
            path: entry.into_path(),
            kind,
        });
    }
    artifacts.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(artifacts)
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().is_some_and(|n| n == name)
}
