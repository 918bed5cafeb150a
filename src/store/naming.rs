//! Client build file names: `aos2-client-<tag>-<platform>.jar`.

use std::cmp::Ordering;
use std::fmt;

pub const PRODUCT: &str = "aos2";
pub const ARTIFACT_EXTENSION: &str = "jar";

/// A strict `vMAJOR.MINOR.PATCH` release tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VersionTag {
    text: String,
    parts: [u64; 3],
}

impl VersionTag {
    /// Returns `None` unless the whole input is `v` followed by three dot-separated numbers.
    pub fn parse(input: &str) -> Option<Self> {
        let digits = input.strip_prefix('v')?;
        let mut parts = [0u64; 3];
        let mut fields = digits.split('.');
        for slot in &mut parts {
            let field = fields.next()?;
            if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            // Only overflow can fail here; such components sort last.
            *slot = field.parse().unwrap_or(u64::MAX);
        }
        if fields.next().is_some() {
            return None;
        }
        Some(Self {
            text: input.to_owned(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Ord for VersionTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts
            .cmp(&other.parts)
            .then_with(|| self.text.cmp(&other.text))
    }
}

impl PartialOrd for VersionTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Suffix baked into official file names for the platform this binary was built for.
pub fn platform_suffix() -> &'static str {
    if cfg!(target_os = "windows") {
        if cfg!(target_arch = "aarch64") {
            "windows-aarch64"
        } else {
            "windows-amd64"
        }
    } else if cfg!(target_os = "macos") {
        if cfg!(target_arch = "aarch64") {
            "macos-aarch64"
        } else {
            "macos-amd64"
        }
    } else if cfg!(target_arch = "aarch64") {
        "linux-aarch64"
    } else {
        "linux-amd64"
    }
}

pub fn official_file_name(tag: &VersionTag) -> String {
    official_file_name_for(tag, platform_suffix())
}

pub fn official_file_name_for(tag: &VersionTag, platform: &str) -> String {
    format!("{PRODUCT}-client-{tag}-{platform}.{ARTIFACT_EXTENSION}")
}

/// Extract the tag from an official file name built for the running platform.
pub fn parse_official_file_name(name: &str) -> Option<VersionTag> {
    parse_official_file_name_for(name, platform_suffix())
}

pub fn parse_official_file_name_for(name: &str, platform: &str) -> Option<VersionTag> {
    let rest = name.strip_prefix(PRODUCT)?.strip_prefix("-client-")?;
    let rest = rest
        .strip_suffix(ARTIFACT_EXTENSION)?
        .strip_suffix('.')?
        .strip_suffix(platform)?
        .strip_suffix('-')?;
    VersionTag::parse(rest)
}

/// File stem of a `.jar` name, `None` for anything else.
pub fn artifact_stem(name: &str) -> Option<&str> {
    name.strip_suffix(ARTIFACT_EXTENSION)?
        .strip_suffix('.')
        .filter(|stem| !stem.is_empty())
}
