//! Loaders for the four population tables.
//!
//! Keys are `DEPCOM + LIBMIN` — the code alone is not unique, it gets
//! recycled across merges.

use std::{collections::HashMap, io::Read, path::Path};

use cogtrail_core::population::PopulationIndex;

use crate::{Error, Result, decode};

pub fn load_populations(dir: impl AsRef<Path>) -> Result<PopulationIndex> {
  let dir = dir.as_ref();
  let metropole = load_table(dir.join("population_metropole.csv"))?;
  let arrondissements =
    load_table(dir.join("population_arrondissements.csv"))?;
  let dom = load_table(dir.join("population_dom.csv"))?;
  let mortes = load_table(dir.join("population_mortes.csv"))?;
  Ok(PopulationIndex {
    metropole,
    arrondissements,
    dom,
    mortes: mortes.into_keys().collect(),
  })
}

fn load_table(path: impl AsRef<Path>) -> Result<HashMap<String, u32>> {
  let reader = decode::open(path.as_ref(), b';')?;
  parse(reader)
}

fn parse<R: Read>(mut reader: csv::Reader<R>) -> Result<HashMap<String, u32>> {
  let columns = decode::Columns::new(&mut reader)?;
  let mut table = HashMap::new();
  for record in reader.records() {
    let record = record?;
    let key = format!(
      "{}{}",
      columns.get(&record, "DEPCOM")?,
      columns.get(&record, "LIBMIN")?
    );
    let raw = columns.get(&record, "PMUN13")?;
    let count: u32 = if raw.is_empty() {
      0
    } else {
      raw.parse().map_err(|_| Error::Number {
        column: "PMUN13",
        value:  raw.to_string(),
      })?
    };
    table.insert(key, count);
  }
  Ok(table)
}
