use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tar::Archive;
use zip::read::ZipArchive;

use crate::config::LauncherConfig;
use crate::download::stream_to_file;
use crate::error::LauncherError;
use crate::networking::{build_client, open_stream};
use crate::progress::ProgressReporter;
use crate::store::ArtifactStore;

const JRE_VERSION: &str = "17";
const EMBEDDED_JRE_CONFIG: &str = include_str!("../../jre.json");

#[derive(Debug, Clone, Deserialize)]
struct JrePlatform {
    url: String,
    #[serde(default)]
    sha256: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JreConfig {
    download_url: HashMap<String, HashMap<String, JrePlatform>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ArchiveKind {
    TarGz,
    Zip,
}

#[derive(Debug, PartialEq, Eq)]
struct DownloadTarget {
    url: String,
    checksum: Option<String>,
    archive: ArchiveKind,
}

/// Makes sure a Java runtime is available under the launcher's `jre/` folder.
#[derive(Debug)]
pub struct RuntimeValidator {
    cache_dir: PathBuf,
    jre_dir: PathBuf,
    config_url: String,
    client: Client,
    metadata_timeout: Duration,
    transfer_timeout: Duration,
}

impl RuntimeValidator {
    pub fn new(config: &LauncherConfig) -> Self {
        Self {
            cache_dir: config.dirs.cache_dir(),
            jre_dir: config.dirs.jre_dir(),
            config_url: config.runtime_config_url.clone(),
            client: build_client(config.metadata_timeout),
            metadata_timeout: config.metadata_timeout,
            transfer_timeout: config.transfer_timeout,
        }
    }

    pub fn java_path(&self) -> PathBuf {
        java_path_in(&self.jre_dir)
    }

    /// Path to the `java` executable, downloading and unpacking a runtime first if needed.
    pub async fn ensure_runtime(&self, progress: &ProgressReporter) -> Result<PathBuf, LauncherError> {
        let java_path = self.java_path();
        if java_path.exists() {
            debug!("jre: runtime already present at {}", java_path.display());
            return Ok(java_path);
        }
        if self.jre_dir.exists() {
            let jre_dir = self.jre_dir.clone();
            blocking(move || normalize_layout(&jre_dir)).await?;
            if java_path.exists() {
                debug!("jre: runtime found after layout normalization");
                return Ok(java_path);
            }
        }

        let guard = progress.begin("Downloading Java runtime...");
        info!("jre: no runtime at {}, installing", java_path.display());
        tokio::fs::create_dir_all(&self.jre_dir)
            .await
            .map_err(|e| LauncherError::runtime_from("unable to create JRE dir", e))?;

        let config = match self.fetch_remote_config().await {
            Ok(config) => config,
            Err(err) => {
                warn!("jre: remote config unavailable ({err}); using embedded copy");
                embedded_config()?
            }
        };
        let target = pick_platform_target(&config).unwrap_or_else(adoptium_fallback);
        info!("jre: selected target {}", target.url);

        let archive_name = format!("jre{}", target.archive.extension());
        let archive_path = self.cache_dir.join(&archive_name);
        let mut needs_download = !archive_path.exists();
        if !needs_download && let Some(expected) = target.checksum.clone() {
            let path = archive_path.clone();
            if blocking(move || verify_sha256(&path, &expected)).await.is_err() {
                warn!("jre: cached archive failed verification; downloading again");
                needs_download = true;
            }
        }
        if needs_download {
            info!("jre: downloading archive to {}", archive_path.display());
            let body = open_stream(&self.client, &target.url, self.transfer_timeout)
                .await
                .map_err(|e| LauncherError::runtime_from("failed to download JRE", e))?;
            let pending = ArtifactStore::new(&self.cache_dir)
                .begin_write(&archive_name)
                .await?;
            stream_to_file(body, pending, progress)
                .await
                .map_err(|e| LauncherError::runtime_from("failed to download JRE", e))?;
        }
        if let Some(expected) = target.checksum.clone() {
            let path = archive_path.clone();
            if let Err(err) = blocking(move || verify_sha256(&path, &expected)).await {
                self.discard_install(&archive_path).await;
                return Err(err);
            }
        }

        guard.set_action_text("Installing Java runtime...");
        progress.set_fraction(None);
        let jre_dir = self.jre_dir.clone();
        let archive = target.archive;
        let source = archive_path.clone();
        let installed = blocking(move || {
            extract_archive(&source, &jre_dir, archive)?;
            normalize_layout(&jre_dir)
        })
        .await
        .and_then(|()| {
            if java_path.exists() {
                Ok(())
            } else {
                Err(LauncherError::RuntimeUnavailable(format!(
                    "runtime archive did not provide {}",
                    java_path.display()
                )))
            }
        });
        if let Err(err) = installed {
            self.discard_install(&archive_path).await;
            return Err(err);
        }
        info!("jre: ready at {}", java_path.display());
        Ok(java_path)
    }

    /// Forget a failed install so the next call downloads a fresh archive.
    async fn discard_install(&self, archive_path: &Path) {
        warn!("jre: discarding {} after failed install", archive_path.display());
        if let Err(err) = tokio::fs::remove_file(archive_path).await
            && err.kind() != io::ErrorKind::NotFound
        {
            warn!("jre: could not remove {}: {err}", archive_path.display());
        }
        if let Err(err) = tokio::fs::remove_dir_all(&self.jre_dir).await
            && err.kind() != io::ErrorKind::NotFound
        {
            warn!("jre: could not remove {}: {err}", self.jre_dir.display());
        }
    }

    async fn fetch_remote_config(&self) -> Result<JreConfig, LauncherError> {
        let resp = self
            .client
            .get(&self.config_url)
            .timeout(self.metadata_timeout)
            .send()
            .await
            .map_err(|e| LauncherError::runtime_from("config request failed", e))?
            .error_for_status()
            .map_err(|e| LauncherError::runtime_from("config request bad status", e))?;
        let text = resp
            .text()
            .await
            .map_err(|e| LauncherError::runtime_from("config body error", e))?;
        parse_config(&text)
    }
}

async fn blocking<F, T>(work: F) -> Result<T, LauncherError>
where
    F: FnOnce() -> Result<T, LauncherError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| LauncherError::runtime_from("runtime install task failed", e))?
}

fn java_path_in(jre_dir: &Path) -> PathBuf {
    let bin = if cfg!(target_os = "windows") {
        Path::new("bin").join("java.exe")
    } else {
        Path::new("bin").join("java")
    };
    jre_dir.join(bin)
}

fn parse_config(text: &str) -> Result<JreConfig, LauncherError> {
    serde_json::from_str(text).map_err(|e| LauncherError::runtime_from("jre.json parse error", e))
}

fn embedded_config() -> Result<JreConfig, LauncherError> {
    parse_config(EMBEDDED_JRE_CONFIG)
}

fn pick_platform_target(config: &JreConfig) -> Option<DownloadTarget> {
    let (os_key, arch_key, default_archive) = platform_keys();
    target_for(config, os_key, arch_key, default_archive)
}

fn target_for(
    config: &JreConfig,
    os_key: &str,
    arch_key: &str,
    default_archive: ArchiveKind,
) -> Option<DownloadTarget> {
    let platform = config.download_url.get(os_key)?.get(arch_key)?;
    let checksum = platform.sha256.trim();
    Some(DownloadTarget {
        url: platform.url.clone(),
        checksum: (!checksum.is_empty()).then(|| checksum.to_owned()),
        archive: guess_archive_kind(&platform.url).unwrap_or(default_archive),
    })
}

fn adoptium_fallback() -> DownloadTarget {
    let (os_key, arch_key, archive) = adoptium_platform();
    let url = format!(
        "https://api.adoptium.net/v3/binary/latest/{JRE_VERSION}/ga/{os_key}/{arch_key}/jre/hotspot/normal/eclipse?project=jdk"
    );
    warn!("jre: using adoptium fallback for {} {}", os_key, arch_key);
    DownloadTarget {
        url,
        checksum: None,
        archive,
    }
}

fn verify_sha256(path: &Path, expected: &str) -> Result<(), LauncherError> {
    let mut file =
        fs::File::open(path).map_err(|e| LauncherError::runtime_from("checksum open error", e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file
            .read(&mut buf)
            .map_err(|e| LauncherError::runtime_from("checksum read error", e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    let actual = format!("{:x}", hasher.finalize());
    if actual != expected.to_lowercase() {
        return Err(LauncherError::RuntimeUnavailable(format!(
            "checksum mismatch: expected {expected}, got {actual}"
        )));
    }
    Ok(())
}

fn extract_archive(archive_path: &Path, jre_dir: &Path, kind: ArchiveKind) -> Result<(), LauncherError> {
    info!("jre: extracting {} as {:?}", archive_path.display(), kind);
    match kind {
        ArchiveKind::TarGz => extract_targz(archive_path, jre_dir),
        ArchiveKind::Zip => extract_zip(archive_path, jre_dir),
    }
}

fn extract_targz(archive_path: &Path, jre_dir: &Path) -> Result<(), LauncherError> {
    let file = fs::File::open(archive_path)
        .map_err(|e| LauncherError::runtime_from("tar.gz open error", e))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive
        .unpack(jre_dir)
        .map_err(|e| LauncherError::runtime_from("tar.gz extract error", e))
}

fn extract_zip(archive_path: &Path, jre_dir: &Path) -> Result<(), LauncherError> {
    let file =
        fs::File::open(archive_path).map_err(|e| LauncherError::runtime_from("zip open error", e))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| LauncherError::runtime_from("zip parse error", e))?;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| LauncherError::runtime_from("zip entry error", e))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("jre: skipping unsafe zip entry {}", entry.name());
            continue;
        };
        let out_path = jre_dir.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|e| LauncherError::runtime_from("zip dir create error", e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| LauncherError::runtime_from("zip parent dir error", e))?;
        }
        let mut out_file = fs::File::create(&out_path)
            .map_err(|e| LauncherError::runtime_from("zip create file error", e))?;
        io::copy(&mut entry, &mut out_file)
            .map_err(|e| LauncherError::runtime_from("zip write error", e))?;
    }
    Ok(())
}

/// Hoist the contents of a lone top-level folder (`jdk-17.../`) into `jre_dir`.
fn normalize_layout(jre_dir: &Path) -> Result<(), LauncherError> {
    debug!("jre: normalizing layout in {}", jre_dir.display());
    let mut entries =
        fs::read_dir(jre_dir).map_err(|e| LauncherError::runtime_from("read jre dir error", e))?;
    let first = match entries.next() {
        Some(Ok(entry)) => entry,
        _ => return Ok(()),
    };
    if entries.next().is_some() {
        return Ok(());
    }
    let is_dir = first
        .file_type()
        .map_err(|e| LauncherError::runtime_from("read jre dir error", e))?
        .is_dir();
    if !is_dir {
        return Ok(());
    }

    let top = jre_dir.join(first.file_name());
    #[cfg_attr(not(target_os = "macos"), allow(unused_mut))]
    let mut subdir = top.clone();
    #[cfg(target_os = "macos")]
    {
        let mac_home = subdir.join("Contents").join("Home");
        if mac_home.exists() {
            subdir = mac_home;
        }
    }

    let sub_entries =
        fs::read_dir(&subdir).map_err(|e| LauncherError::runtime_from("read subdir error", e))?;
    for entry in sub_entries {
        let entry = entry.map_err(|e| LauncherError::runtime_from("subdir entry error", e))?;
        let from = entry.path();
        let to = jre_dir.join(entry.file_name());
        if fs::rename(&from, &to).is_err() {
            // Rename fails across devices; copy instead.
            match entry.file_type() {
                Ok(ft) if ft.is_dir() => copy_dir(&from, &to)?,
                _ => {
                    fs::copy(&from, &to)
                        .map_err(|e| LauncherError::runtime_from("copy file error", e))?;
                }
            }
        }
    }

    if let Err(err) = fs::remove_dir_all(&top) {
        warn!("jre: could not remove {}: {err}", top.display());
    }
    Ok(())
}

fn copy_dir(from: &Path, to: &Path) -> Result<(), LauncherError> {
    fs::create_dir_all(to).map_err(|e| LauncherError::runtime_from("copy dir create error", e))?;
    for entry in fs::read_dir(from).map_err(|e| LauncherError::runtime_from("copy dir read error", e))? {
        let entry = entry.map_err(|e| LauncherError::runtime_from("copy dir entry error", e))?;
        let src_path = entry.path();
        let dst_path = to.join(entry.file_name());
        let is_dir = entry
            .file_type()
            .map_err(|e| LauncherError::runtime_from("copy filetype error", e))?
            .is_dir();
        if is_dir {
            copy_dir(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)
                .map_err(|e| LauncherError::runtime_from("copy file error", e))?;
        }
    }
    Ok(())
}

fn platform_keys() -> (&'static str, &'static str, ArchiveKind) {
    let os = if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else {
        "linux"
    };

    let arch = if cfg!(target_arch = "x86_64") {
        "x64"
    } else if cfg!(target_arch = "aarch64") {
        "arm64"
    } else {
        std::env::consts::ARCH
    };

    (os, arch, default_archive())
}

fn adoptium_platform() -> (&'static str, &'static str, ArchiveKind) {
    let os = if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "mac"
    } else {
        "linux"
    };

    let arch = if cfg!(target_arch = "x86_64") {
        "x64"
    } else if cfg!(target_arch = "aarch64") {
        "aarch64"
    } else {
        std::env::consts::ARCH
    };

    (os, arch, default_archive())
}

fn default_archive() -> ArchiveKind {
    if cfg!(target_os = "windows") {
        ArchiveKind::Zip
    } else {
        ArchiveKind::TarGz
    }
}

fn guess_archive_kind(url: &str) -> Option<ArchiveKind> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    if path.ends_with(".zip") {
        Some(ArchiveKind::Zip)
    } else if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
        Some(ArchiveKind::TarGz)
    } else {
        None
    }
}

impl ArchiveKind {
    fn extension(self) -> &'static str {
        match self {
            ArchiveKind::TarGz => ".tar.gz",
            ArchiveKind::Zip => ".zip",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn embedded_config_covers_this_platform() {
        let config = embedded_config().expect("embedded jre.json should parse");
        let target = pick_platform_target(&config).expect("platform should be listed");
        assert!(target.url.starts_with("https://"));
    }

    #[test]
    fn picks_target_and_checksum() {
        let config = parse_config(
            r#"{"download_url": {"linux": {"x64": {"url": "https://cdn.example/jre.tar.gz", "sha256": " ABC "}},
                                 "windows": {"x64": {"url": "https://cdn.example/jre?id=1"}}}}"#,
        )
        .expect("config should parse");

        let linux = target_for(&config, "linux", "x64", ArchiveKind::Zip).expect("linux target");
        assert_eq!(linux.archive, ArchiveKind::TarGz);
        assert_eq!(linux.checksum.as_deref(), Some("ABC"));

        let windows = target_for(&config, "windows", "x64", ArchiveKind::Zip).expect("windows target");
        assert_eq!(windows.archive, ArchiveKind::Zip);
        assert_eq!(windows.checksum, None);

        assert!(target_for(&config, "macos", "arm64", ArchiveKind::TarGz).is_none());
    }

    #[test]
    fn guesses_archive_kind_ignoring_query() {
        assert_eq!(guess_archive_kind("https://x/jre.zip?sig=1"), Some(ArchiveKind::Zip));
        assert_eq!(guess_archive_kind("https://x/jre.tgz"), Some(ArchiveKind::TarGz));
        assert_eq!(guess_archive_kind("https://x/latest?project=jdk"), None);
    }

    #[test]
    fn verifies_sha256() {
        let temp = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp.path().join("jre.tar.gz");
        fs::write(&path, b"hello").expect("fixture");
        let digest = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        verify_sha256(&path, digest).expect("digest should match");
        verify_sha256(&path, &digest.to_uppercase()).expect("case-insensitive");
        let err = verify_sha256(&path, "00").expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::RuntimeUnavailable);
    }

    #[test]
    fn normalizes_single_top_level_folder() {
        let temp = tempfile::tempdir().expect("temporary directory should be created");
        let jre = temp.path().join("jre");
        let nested_bin = jre.join("jdk-17.0.8+7-jre").join("bin");
        fs::create_dir_all(&nested_bin).expect("fixture dirs");
        fs::write(nested_bin.join("java"), b"#!").expect("fixture");
        fs::write(nested_bin.join("java.exe"), b"MZ").expect("fixture");

        normalize_layout(&jre).expect("normalize should succeed");
        assert!(java_path_in(&jre).exists());
        assert!(!jre.join("jdk-17.0.8+7-jre").exists());
    }

    #[test]
    fn extracts_tar_gz_archive() {
        let temp = tempfile::tempdir().expect("temporary directory should be created");
        let archive_path = temp.path().join("jre.tar.gz");
        {
            let file = fs::File::create(&archive_path).expect("archive file");
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::fast());
            let mut builder = tar::Builder::new(encoder);
            let payload = b"java";
            let mut header = tar::Header::new_gnu();
            header.set_size(payload.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, "jdk/bin/java", &payload[..])
                .expect("append entry");
            builder
                .into_inner()
                .expect("finish tar")
                .finish()
                .expect("finish gzip")
                .flush()
                .expect("flush");
        }

        let jre = temp.path().join("jre");
        fs::create_dir_all(&jre).expect("jre dir");
        extract_archive(&archive_path, &jre, ArchiveKind::TarGz).expect("extract");
        normalize_layout(&jre).expect("normalize");
        assert_eq!(fs::read(jre.join("bin").join("java")).expect("read"), b"java");
    }

    #[tokio::test]
    async fn corrupt_cached_archive_is_discarded() {
        let temp = tempfile::tempdir().expect("temporary directory should be created");
        let mut config = LauncherConfig::with_home(temp.path());
        config.runtime_config_url = "http://127.0.0.1:9/unreachable".into();
        let validator = RuntimeValidator::new(&config);
        let cache_dir = config.dirs.cache_dir();
        fs::create_dir_all(&cache_dir).expect("cache dir");
        let archive = cache_dir.join(format!("jre{}", default_archive().extension()));
        fs::write(&archive, b"not an archive").expect("fixture");

        let progress = ProgressReporter::new();
        let err = validator
            .ensure_runtime(&progress)
            .await
            .expect_err("corrupt archive cannot be installed");
        assert_eq!(err.kind(), ErrorKind::RuntimeUnavailable);
        assert!(!archive.exists());
        assert!(!config.dirs.jre_dir().exists());
        assert!(!progress.snapshot().active);
    }

    #[tokio::test]
    async fn existing_runtime_needs_no_network() {
        let temp = tempfile::tempdir().expect("temporary directory should be created");
        let mut config = LauncherConfig::with_home(temp.path());
        config.runtime_config_url = "http://127.0.0.1:9/unreachable".into();
        let validator = RuntimeValidator::new(&config);
        let java = validator.java_path();
        fs::create_dir_all(java.parent().expect("bin dir")).expect("fixture dirs");
        fs::write(&java, b"#!").expect("fixture");

        let progress = ProgressReporter::new();
        let path = validator
            .ensure_runtime(&progress)
            .await
            .expect("runtime should be found");
        assert_eq!(path, java);
        assert!(!progress.snapshot().active);
    }
}
