use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid TOML serialization: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("invalid external-functions JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid integer literal {0:?}")]
    BadInteger(String),
}
