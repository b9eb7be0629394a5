//! Windows-1252 delimited readers.
//!
//! The registry ships its files in cp1252; everything is transcoded to
//! UTF-8 on the fly before the CSV layer sees a byte.

use std::{fs::File, io::Read, path::Path};

use encoding_rs::WINDOWS_1252;
use encoding_rs_io::DecodeReaderBytesBuilder;

use crate::{Error, Result};

/// Open `path` as a cp1252 delimited file with a header row.
pub(crate) fn open(
  path: &Path,
  delimiter: u8,
) -> Result<csv::Reader<impl Read>> {
  let file = File::open(path).map_err(|source| Error::Io {
    path: path.to_path_buf(),
    source,
  })?;
  Ok(from_reader(file, delimiter))
}

/// Wrap any byte stream (used directly by tests) in the same transcoding
/// CSV reader as [`open`].
pub(crate) fn from_reader<R: Read>(
  input: R,
  delimiter: u8,
) -> csv::Reader<impl Read> {
  let decoded = DecodeReaderBytesBuilder::new()
    .encoding(Some(WINDOWS_1252))
    .build(input);
  csv::ReaderBuilder::new()
    .delimiter(delimiter)
    .has_headers(true)
    .flexible(true)
    .from_reader(decoded)
}

/// Column lookup over a header row.
pub(crate) struct Columns {
  headers: csv::StringRecord,
}

impl Columns {
  pub fn new<R: Read>(reader: &mut csv::Reader<R>) -> Result<Self> {
    let headers = reader.headers()?.clone();
    Ok(Self { headers })
  }

  /// The field under `column` for `record`, trimmed; empty when the row
  /// is shorter than the header.
  pub fn get<'a>(
    &self,
    record: &'a csv::StringRecord,
    column: &'static str,
  ) -> Result<&'a str> {
    let index = self
      .headers
      .iter()
      .position(|header| header == column)
      .ok_or(Error::MissingColumn { column })?;
    Ok(record.get(index).unwrap_or_default().trim())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn transcodes_cp1252_accents() {
    // "Châlons" with 0xE2 for â, tab-delimited.
    let bytes: &[u8] = b"DEP\tNCCENR\n51\tCh\xe2lons\n";
    let mut reader = from_reader(bytes, b'\t');
    let columns = Columns::new(&mut reader).unwrap();
    let record = reader.records().next().unwrap().unwrap();
    assert_eq!(columns.get(&record, "NCCENR").unwrap(), "Châlons");
  }

  #[test]
  fn missing_columns_are_reported_by_name() {
    let bytes: &[u8] = b"DEP\tCOM\n51\t108\n";
    let mut reader = from_reader(bytes, b'\t');
    let columns = Columns::new(&mut reader).unwrap();
    let record = reader.records().next().unwrap().unwrap();
    assert!(matches!(
      columns.get(&record, "NCCENR"),
      Err(Error::MissingColumn { column: "NCCENR" })
    ));
  }

  #[test]
  fn short_rows_read_as_empty_fields() {
    let bytes: &[u8] = b"DEP\tCOM\tNCCANC\n51\t108\n";
    let mut reader = from_reader(bytes, b'\t');
    let columns = Columns::new(&mut reader).unwrap();
    let record = reader.records().next().unwrap().unwrap();
    assert_eq!(columns.get(&record, "NCCANC").unwrap(), "");
  }
}
