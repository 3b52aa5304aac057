use std::io;

use thiserror::Error;

use crate::types::SplitName;

/// Error type for sampler configuration, dataset access, and IO failures.
#[derive(Debug, Error)]
pub enum SamplerError {
    /// Invalid configuration value or combination.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The strategy has no implementation for the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    /// The dataset cannot supply a positive-pair index.
    #[error("positive-pair index '{name}' is not available")]
    MissingIndex {
        /// Requested index name.
        name: String,
    },
    /// The dataset has no split with this name.
    #[error("dataset split '{split}' is not available")]
    MissingSplit {
        /// Requested split name.
        split: SplitName,
    },
    /// Dataset contents contradict its declared vocabulary.
    #[error("dataset returned inconsistent data: {details}")]
    DatasetInconsistent {
        /// What was inconsistent.
        details: String,
    },
    /// A negative matrix shape does not fit its buffer or overflows `usize`.
    #[error("invalid negative matrix shape {rows}x{cols}: {details}")]
    InvalidShape {
        /// Requested rows.
        rows: usize,
        /// Requested columns.
        cols: usize,
        /// What is wrong with the shape.
        details: String,
    },
    /// Reading configuration failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}
