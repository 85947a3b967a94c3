#![deny(unsafe_code)]

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to parse JSON catalog {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} line {line}: {message}")]
    InvalidRow {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("duplicate test definition: {code}")]
    DuplicateTest { code: String },

    #[error("parameter {parameter} references unknown test {test}")]
    UnknownTest { test: String, parameter: String },
}

impl CatalogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn row(path: impl Into<PathBuf>, line: u64, message: impl Into<String>) -> Self {
        Self::InvalidRow {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}
