//! Container codec: class collections on disk.
//!
//! A container is a JSON document holding an ordered class list. The codec is
//! deliberately thin — parse on read, serialize on write — and everything the
//! engine consumes goes through the typed [`crate::model`] structures, so the
//! merge itself never touches raw bytes.
//!
//! Class order in the document is meaningful and preserved exactly.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::DexClass;

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// An on-disk class collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Container {
    /// Classes in container order.
    #[serde(default)]
    pub classes: Vec<DexClass>,
}

impl Container {
    /// A container over an already-built class list.
    #[must_use]
    pub fn new(classes: Vec<DexClass>) -> Self {
        Self { classes }
    }
}

// ---------------------------------------------------------------------------
// ContainerError
// ---------------------------------------------------------------------------

/// Error reading or writing a container file.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// The file could not be read or written.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a well-formed container document.
    #[error("{path}: malformed container: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Read and parse a container file.
///
/// # Errors
/// [`ContainerError::Io`] on read failure, [`ContainerError::Malformed`] on
/// parse failure.
pub fn read_container(path: &Path) -> Result<Container, ContainerError> {
    let contents = fs::read_to_string(path).map_err(|source| ContainerError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ContainerError::Malformed {
        path: path.to_owned(),
        source,
    })
}

/// Serialize and write a container file.
///
/// # Errors
/// [`ContainerError::Io`] on write failure.
pub fn write_container(path: &Path, container: &Container) -> Result<(), ContainerError> {
    let io_err = |source| ContainerError::Io {
        path: path.to_owned(),
        source,
    };
    let mut contents = serde_json::to_string_pretty(container)
        .map_err(|e| io_err(std::io::Error::other(e)))?;
    contents.push('\n');
    fs::write(path, contents).map_err(io_err)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
