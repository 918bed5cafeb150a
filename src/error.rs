use thiserror::Error;

/// Every failure the launcher core can report to its caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LauncherError {
    #[error("Version {identifier} not found")]
    NotFound { identifier: String },

    #[error("Release {tag} has no client build for this platform ({platform})")]
    AssetNotFound { tag: String, platform: &'static str },

    #[error("Download failed: {0}")]
    Transfer(String),

    #[error("Could not fetch the release list: {0}")]
    Catalog(String),

    #[error("IO error ({kind}): {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },

    #[error("Java runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("An error occurred while starting the game: {0}")]
    Launch(String),

    #[error("The game exited with error code: {code}")]
    AbnormalExit { code: i32 },

    #[error("The game was interrupted: {0}")]
    Interrupted(String),
}

/// Payload-free discriminant of [`LauncherError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AssetNotFound,
    Transfer,
    Catalog,
    Io,
    RuntimeUnavailable,
    Launch,
    AbnormalExit,
    Interrupted,
}

impl LauncherError {
    pub fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
        }
    }

    pub fn transfer_from<E>(context: &str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::Transfer(format!("{context}: {error}"))
    }

    pub fn catalog_from<E>(context: &str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::Catalog(format!("{context}: {error}"))
    }

    pub fn runtime_from<E>(context: &str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::RuntimeUnavailable(format!("{context}: {error}"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AssetNotFound { .. } => ErrorKind::AssetNotFound,
            Self::Transfer(_) => ErrorKind::Transfer,
            Self::Catalog(_) => ErrorKind::Catalog,
            Self::Io { .. } => ErrorKind::Io,
            Self::RuntimeUnavailable(_) => ErrorKind::RuntimeUnavailable,
            Self::Launch(_) => ErrorKind::Launch,
            Self::AbnormalExit { .. } => ErrorKind::AbnormalExit,
            Self::Interrupted(_) => ErrorKind::Interrupted,
        }
    }
}

impl From<std::io::Error> for LauncherError {
    fn from(err: std::io::Error) -> Self {
        LauncherError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
