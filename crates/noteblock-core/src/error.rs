use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("upload is empty")]
    Empty,

    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("upload rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("could not resolve a config directory")]
    ProjectDir,
}

/// Umbrella error for wiring an editor up from configuration.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type EditorResult<T> = Result<T, EditorError>;
