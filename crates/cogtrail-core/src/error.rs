//! Error types for `cogtrail-core`.

use thiserror::Error;

use crate::{record::Change, town::TownId};

#[derive(Debug, Error)]
pub enum Error {
  /// Invariant violation: an interval must start strictly before it ends.
  /// Raised at the derive choke point, never allowed into the store.
  #[error("invalid interval for {id}: start {start} >= end {end}")]
  InvalidInterval {
    id:    TownId,
    start: chrono::NaiveDateTime,
    end:   chrono::NaiveDateTime,
  },

  #[error("attempt to create an existing town: {0}")]
  TownExists(TownId),

  #[error("attempt to update an unknown town: {0}")]
  UnknownTown(TownId),

  /// No interval at all is recorded for the requested INSEE code.
  #[error("no town recorded for depcom {0}")]
  MissingTown(String),

  /// A handler failed; carries the offending record for diagnosis.
  #[error("cannot apply {change}: {source}")]
  Apply {
    change: Box<Change>,
    source: Box<Error>,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
