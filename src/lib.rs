pub mod capture;
pub mod core;
pub mod replay_cmd;
pub mod search;
pub mod storage;
pub mod table;

use std::path::PathBuf;

use thiserror::Error;

use crate::core::BuildStatus;

#[derive(Debug, Error)]
pub enum BuildLogError {
    #[error("build is not running (status: {0})")]
    InvalidState(BuildStatus),
    #[error("{context} {}: {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl BuildLogError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildLogError::Io { context, path: path.into(), source }
    }
}

pub type BuildLogResult<T> = Result<T, BuildLogError>;
