use std::path::PathBuf;
use std::time::Duration;

use crate::env::AppDirs;

pub const DEFAULT_RELEASES_URL: &str = "https://api.github.com/repos/Ace-of-Shades-2/Game/releases";
pub const DEFAULT_RUNTIME_CONFIG_URL: &str =
    "https://raw.githubusercontent.com/Ace-of-Shades-2/Launcher/main/jre.json";
/// Release and asset listings.
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(3);
/// Binary transfers; client builds and runtimes vary a lot in size.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Debug)]
pub struct LauncherConfig {
    pub dirs: AppDirs,
    pub releases_url: String,
    pub runtime_config_url: String,
    pub metadata_timeout: Duration,
    pub transfer_timeout: Duration,
}

impl LauncherConfig {
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            dirs: AppDirs::new(home),
            ..Self::default()
        }
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            dirs: AppDirs::default(),
            releases_url: DEFAULT_RELEASES_URL.to_owned(),
            runtime_config_url: DEFAULT_RUNTIME_CONFIG_URL.to_owned(),
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
        }
    }
}
