use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type KmcResult<T> = Result<T, KmcError>;

#[derive(Error, Debug)]
pub enum KmcError {
    #[error("Required record not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("Malformed record {}: {message}", path.display())]
    MalformedRecord { path: PathBuf, message: String },

    #[error("Unknown species '{name}'")]
    UnknownSpecies { name: String },

    #[error("Unknown site type '{name}'")]
    UnknownSiteType { name: String },

    #[error("Unknown elementary step '{name}'")]
    UnknownStep { name: String },

    #[error("Degenerate analysis window: {what}")]
    DegenerateWindow { what: String },

    #[error("Insufficient data: {what}")]
    InsufficientData { what: String },

    #[error("Inconsistent model: {what}")]
    InconsistentModel { what: String },

    #[error("Invalid analysis window: {what}")]
    InvalidWindow { what: String },

    #[error("Invalid weight mode '{0}': expected 'none', 'time' or 'nevents'")]
    InvalidWeightMode(String),

    #[error("Invalid range type '{0}': expected 'time' or 'events'")]
    InvalidRangeType(String),

    #[error("Invalid direction '{0}': expected 'fwd', 'rev' or 'net'")]
    InvalidDirection(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl KmcError {
    pub fn malformed(path: &Path, message: impl Into<String>) -> Self {
        KmcError::MalformedRecord {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            KmcError::MissingFile {
                path: path.to_path_buf(),
            }
        } else {
            KmcError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    pub fn unknown_species(name: &str) -> Self {
        KmcError::UnknownSpecies {
            name: name.to_string(),
        }
    }

    pub fn unknown_site_type(name: &str) -> Self {
        KmcError::UnknownSiteType {
            name: name.to_string(),
        }
    }
}

/// Open a record for buffered line reading.
///
/// A missing file is reported as [`KmcError::MissingFile`] so callers can tell it
/// apart from a record that exists but cannot be parsed.
pub fn open_record(path: &Path) -> KmcResult<BufReader<File>> {
    let file = File::open(path).map_err(|e| KmcError::io(path, e))?;
    Ok(BufReader::new(file))
}
