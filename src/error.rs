use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Failures that abort a run before any document is produced
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cannot scan directory {path:?}: {source}")]
    ScanRoot {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
