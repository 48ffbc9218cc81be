use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn a flight log into replayable records.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Cannot read flight log {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No valid fix records in {path}")]
    NoRecords { path: PathBuf },
}

/// Errors reported by sensor collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("Sensor not responding: {0}")]
    NotResponding(String),

    #[error("Sensor read failed: {0}")]
    ReadFailed(String),

    #[error("Sensor init failed: {0}")]
    InitFailed(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for collaborator calls
pub type SensorResult<T> = Result<T, SensorError>;
