//! Loader for the modification history (`historiq2016.txt`).
//!
//! Source order is preserved: the replay depends on it.

use std::{io::Read, path::Path};

use chrono::{NaiveDate, NaiveTime};
use cogtrail_core::record::Change;

use crate::{Error, Result, decode};

pub fn load_history(path: impl AsRef<Path>) -> Result<Vec<Change>> {
  let reader = decode::open(path.as_ref(), b'\t')?;
  parse(reader)
}

fn parse<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<Change>> {
  let columns = decode::Columns::new(&mut reader)?;
  let mut history = Vec::new();
  for record in reader.records() {
    let record = record?;
    let dep = columns.get(&record, "DEP")?.to_string();
    let com = columns.get(&record, "COM")?.to_string();
    let modification: u16 = parse_number(columns.get(&record, "MOD")?, "MOD")?;
    let effective_date = convert_date(columns.get(&record, "EFF")?)?;

    // Multi-record groups carry their size and this record's rank; the
    // cleanup-deferral flag only exists for them.
    let nbcom = columns.get(&record, "NBCOM")?;
    let last = if nbcom.is_empty() {
      None
    } else {
      Some(columns.get(&record, "RANGCOM")? == nbcom)
    };

    history.push(Change {
      depcom: format!("{dep}{com}"),
      modification,
      effective: effective_date.and_time(NaiveTime::MIN),
      effective_date,
      new_name: columns.get(&record, "NCCOFF")?.to_string(),
      former_name: optional(columns.get(&record, "NCCANC")?),
      related: optional(columns.get(&record, "COMECH")?),
      former_depcom: optional(columns.get(&record, "DEPANC")?),
      dep,
      com,
      last,
    });
  }
  Ok(history)
}

fn optional(value: &str) -> Option<String> {
  if value.is_empty() {
    None
  } else {
    Some(value.to_string())
  }
}

fn parse_number(value: &str, column: &'static str) -> Result<u16> {
  value.parse().map_err(|_| Error::Number {
    column,
    value: value.to_string(),
  })
}

/// The history encodes dates as `dd-mm-yyyy`.
fn convert_date(value: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(value, "%d-%m-%Y").map_err(|_| Error::Date {
    value: value.to_string(),
  })
}
