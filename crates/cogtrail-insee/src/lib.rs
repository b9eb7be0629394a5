//! INSEE COG codec for cogtrail.
//!
//! Reads the registry's source files — the towns snapshot and the
//! modification history (cp1252, tab-delimited) and the population tables
//! (cp1252, semicolon-delimited) — into [`cogtrail_core`] domain types.
//! Pure synchronous; no network or database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! let towns = cogtrail_insee::load_towns("sources/france2016.txt").unwrap();
//! let history =
//!   cogtrail_insee::load_history("sources/historiq2016.txt").unwrap();
//! println!("{} towns, {} records", towns.len(), history.len());
//! ```

pub mod error;

mod decode;
mod history;
mod populations;
mod towns;

pub use error::{Error, Result};
pub use history::load_history;
pub use populations::load_populations;
pub use towns::load_towns;
