use std::path::PathBuf;

use crate::env::AppDirs;

pub const DEFAULT_PROFILE_NAME: &str = "My Profile";
pub const DEFAULT_USERNAME: &str = "Player";

/// Launch settings owned by the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub username: String,
    /// Version identifier to play; `None` means the latest release.
    pub client_version: Option<String>,
    /// Extra runtime arguments, split on whitespace.
    pub jvm_args: Option<String>,
    /// Working directory of the game process.
    pub dir: PathBuf,
}

impl Profile {
    pub fn new(name: impl Into<String>, username: impl Into<String>, dirs: &AppDirs) -> Self {
        let name = name.into();
        Self {
            dir: dirs.profile_dir(&name),
            name,
            username: username.into(),
            client_version: None,
            jvm_args: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Server {
    pub host: String,
    pub port: u16,
}
