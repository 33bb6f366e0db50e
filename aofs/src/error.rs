//! Error types for the file layer.
//!
//! Cleanup steps run even after a primary failure, so one call can fail in
//! several places at once. Those failures are collected into [`Errors`] and
//! returned together as [`Error::Multiple`]; nothing gets dropped.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::cadapter::client::StoreError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to allocate scratch file: {0}")]
    Scratch(#[source] io::Error),

    #[error("failed to download {bucket}/{key}: {source}")]
    Download {
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to upload {bucket}/{key}: {source}")]
    Upload {
        bucket: String,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to reposition cache file: {0}")]
    Seek(#[source] io::Error),

    #[error("failed to write cache file: {0}")]
    Write(#[source] io::Error),

    #[error("failed to close cache file {}: {source}", .path.display())]
    CloseCache {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove cache file {}: {source}", .path.display())]
    RemoveCache {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("file is closed")]
    Closed,

    #[error("{0}")]
    Multiple(Errors),
}

impl Error {
    /// Combine `self` with a later failure. Aggregates are flattened, and the
    /// order in which the failures happened is kept.
    pub fn append(self, other: Error) -> Error {
        let mut errors = Errors::new();
        errors.push(self);
        errors.push(other);
        Error::Multiple(errors)
    }

    /// Every individual failure carried by this error, in order.
    pub fn errors(&self) -> Vec<&Error> {
        match self {
            Error::Multiple(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed)
    }
}

/// An ordered list of failures that occurred during a single operation.
#[derive(Debug, Default)]
pub struct Errors(Vec<Error>);

impl Errors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, err: Error) {
        match err {
            Error::Multiple(inner) => self.0.extend(inner.0),
            other => self.0.push(other),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    /// `Ok` when nothing failed, the lone error when exactly one step failed,
    /// and [`Error::Multiple`] otherwise.
    pub fn into_result(mut self) -> Result<()> {
        match self.0.len() {
            0 => Ok(()),
            1 => Err(self.0.remove(0)),
            _ => Err(Error::Multiple(self)),
        }
    }
}

impl IntoIterator for Errors {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.len() {
            1 => write!(f, "1 error occurred:")?,
            n => write!(f, "{n} errors occurred:")?,
        }
        for err in &self.0 {
            write!(f, "\n\t* {err}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_err(msg: &str) -> io::Error {
        io::Error::other(msg.to_string())
    }

    #[test]
    fn test_append_flattens_nested_aggregates() {
        let first = Error::Seek(io_err("seek"));
        let second = Error::Write(io_err("write"));
        let third = Error::Closed;

        let err = first.append(second).append(third);
        let errors = err.errors();
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], Error::Seek(_)));
        assert!(matches!(errors[1], Error::Write(_)));
        assert!(errors[2].is_closed());
    }

    #[test]
    fn test_into_result() {
        assert!(Errors::new().into_result().is_ok());

        let mut single = Errors::new();
        single.push(Error::Closed);
        assert!(single.into_result().unwrap_err().is_closed());

        let mut many = Errors::new();
        many.push(Error::Closed);
        many.push(Error::Scratch(io_err("no space")));
        match many.into_result() {
            Err(Error::Multiple(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_display_lists_every_error() {
        let err = Error::Seek(io_err("bad seek")).append(Error::RemoveCache {
            path: PathBuf::from("/tmp/aofs-x"),
            source: io_err("busy"),
        });
        let msg = err.to_string();
        assert!(msg.starts_with("2 errors occurred:"));
        assert!(msg.contains("bad seek"));
        assert!(msg.contains("/tmp/aofs-x"));
        assert!(msg.contains("busy"));
    }
}
