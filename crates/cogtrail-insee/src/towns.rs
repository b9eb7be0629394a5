//! Loader for the registry snapshot (`france2016.txt`).
//!
//! One [`Town`] per registered INSEE code, validity preset to the whole
//! recorded era. The snapshot carries outdated towns but not renamed
//! ones — the history replay derives those.

use std::{io::Read, path::Path};

use cogtrail_core::town::Town;

use crate::{Result, decode};

/// Rows flagged as cantonal fractions, not municipalities.
const CANTONAL_FRACTION: &str = "9";

pub fn load_towns(path: impl AsRef<Path>) -> Result<Vec<Town>> {
  let reader = decode::open(path.as_ref(), b'\t')?;
  parse(reader)
}

fn parse<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<Town>> {
  let columns = decode::Columns::new(&mut reader)?;
  let mut towns = Vec::new();
  for record in reader.records() {
    let record = record?;
    if columns.get(&record, "ACTUAL")? == CANTONAL_FRACTION {
      continue;
    }
    let dep = columns.get(&record, "DEP")?;
    let com = columns.get(&record, "COM")?;
    let name = name_with_article(
      columns.get(&record, "NCCENR")?,
      columns.get(&record, "ARTMIN")?,
      columns.get(&record, "TNCC")?,
    );
    towns.push(Town::initial(dep, com, name));
  }
  Ok(towns)
}

/// Attach the optional article to the plain name. The snapshot wraps the
/// article in parentheses; type 5 is the elided `L'`, which takes no
/// separating space.
fn name_with_article(nccenr: &str, artmin: &str, tncc: &str) -> String {
  if artmin.is_empty() {
    return nccenr.to_string();
  }
  let article = artmin.trim_start_matches('(').trim_end_matches(')');
  if tncc == "5" {
    format!("{article}{nccenr}")
  } else {
    format!("{article} {nccenr}")
  }
}
