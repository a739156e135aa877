use std::io;
use std::path::PathBuf;

use fotree_source::persist::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Source(#[from] fotree_source::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("unable to read invocation config {}: {1}", .0.display())]
    ReadConfig(PathBuf, #[source] io::Error),

    #[error("unable to parse invocation config {}: {1}", .0.display())]
    ParseConfig(PathBuf, #[source] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
