use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LearnError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt cache file: {0}")]
    CorruptCache(#[from] serde_json::Error),
    #[error("config file error: {0:?}")]
    ConfigFile(PathBuf),
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("embedding error: {0}")]
    Embedding(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, LearnError>;
