//! Error types for `cogtrail-insee`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("cannot open {path}: {source}")]
  Io {
    path:   PathBuf,
    source: std::io::Error,
  },

  #[error("malformed delimited data: {0}")]
  Csv(#[from] csv::Error),

  #[error("missing column {column:?}")]
  MissingColumn { column: &'static str },

  #[error("unreadable date {value:?} (expected dd-mm-yyyy)")]
  Date { value: String },

  #[error("unreadable number {value:?} in column {column:?}")]
  Number {
    column: &'static str,
    value:  String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
