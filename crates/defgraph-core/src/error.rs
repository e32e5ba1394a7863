//! Error type shared by every defgraph crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::MachineId;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, DefgraphError>;

#[derive(Debug, Error)]
pub enum DefgraphError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error at line {line}: {message}")]
    Config { line: usize, message: String },

    #[error("graph '{name}' not found at {path:?}")]
    MissingGraph { name: String, path: PathBuf },

    #[error("malformed graph file: {0}")]
    GraphFormat(String),

    #[error("graph file version {found} not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("no definition for '{0}'")]
    UnknownWord(String),

    #[error("unknown machine: {0}")]
    UnknownMachine(MachineId),

    #[error("machine {machine} has no partition {partition}")]
    InvalidPartition { machine: MachineId, partition: usize },

    #[error("construction rule at line {line}: {message}")]
    ConstructionRule { line: usize, message: String },

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}
