//! Error type shared by all of the derivation steps

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Process name with neither a cross-section nor a fixed rate
    #[error("unknown process `{0}`: no cross-section or fixed rate configured")]
    UnknownProcess(String),

    #[error("failed to open `{path}`: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("histogram `{key}` not found in `{path}`")]
    MissingHistogram { path: PathBuf, key: String },

    #[error("invalid binning: {0}")]
    Binning(String),

    #[error("incompatible histograms: {0}")]
    Incompatible(String),

    #[error("efficiency: {0}")]
    Efficiency(String),

    #[error("no processed events: {0}")]
    NoEvents(String),

    #[error("configuration: {0}")]
    Config(String),

    #[error("unsupported container format `{0}`")]
    Format(String),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "hdf5-input")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
