use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotefoldError {
    #[error("invalid input: {0}")]
    Input(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to move {path:?}: {source}")]
    Move {
        path: PathBuf,
        #[source]
        source: MoveError,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, NotefoldError>;

#[derive(Error, Debug)]
pub enum MoveError {
    #[error("destination already exists: {0:?}")]
    Collision(PathBuf),
    #[error("source no longer exists: {0:?}")]
    MissingSource(PathBuf),
    #[error("source has no file name: {0:?}")]
    NoFileName(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
