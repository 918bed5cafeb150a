use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the root directory used by the launcher (`~/.ace-of-shades`).
pub fn default_app_dir() -> PathBuf {
    let home = match env::consts::OS {
        "windows" => env::var_os("USERPROFILE").or_else(|| env::var_os("HOME")),
        _ => env::var_os("HOME"),
    }
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("."));

    home.join(".ace-of-shades")
}

/// Folder layout below the launcher root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppDirs {
    root: PathBuf,
}

impl AppDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Downloaded and hand-placed client builds.
    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.root.join("profiles")
    }

    pub fn profile_dir(&self, name: &str) -> PathBuf {
        self.profiles_dir().join(name)
    }

    pub fn jre_dir(&self) -> PathBuf {
        self.root.join("jre")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Create the on-disk folder layout expected by the launcher.
    pub fn ensure(&self) -> std::io::Result<()> {
        let folders = [
            self.root.clone(),
            self.versions_dir(),
            self.profiles_dir(),
            self.cache_dir(),
        ];

        for dir in folders {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

impl Default for AppDirs {
    fn default() -> Self {
        Self::new(default_app_dir())
    }
}
