use std::io;

use thiserror::Error;

use crate::persist::StoreError;
use crate::SourceKind;

/// Errors surfaced by the [crate::SourceFactory].
///
/// Construction either fully succeeds or fails with one of these, there are
/// no partially built sources.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),

    #[error("i/o failure at {0}: {1}")]
    Io(String, #[source] io::Error),

    #[error("unable to construct source: {0}")]
    Construction(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Maps an [io::Error] encountered while working on `what`.
    /// A [io::ErrorKind::NotFound] becomes [Error::NotFound], everything else
    /// stays an [Error::Io].
    pub(crate) fn io(what: impl std::fmt::Display, e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            Error::NotFound(what.to_string())
        } else {
            Error::Io(what.to_string(), e)
        }
    }

    pub(crate) fn construction<E>(e: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Construction(e.into())
    }
}

impl From<StoreError> for Error {
    fn from(value: StoreError) -> Self {
        Error::Construction(Box::new(value))
    }
}

impl From<ConstructionError> for Error {
    fn from(value: ConstructionError) -> Self {
        Error::Construction(Box::new(value))
    }
}

/// Reasons a requested source can't be built from otherwise valid inputs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("byte range at offset {offset} with size {size} exceeds parent length {len}")]
    RangeOutOfBounds { offset: u64, size: u64, len: u64 },

    #[error("{0} source has no byte content to take a range of")]
    NoContent(SourceKind),
}
