//! CSV export of the reconstructed timeline.
//!
//! One row per interval-entity; with the full export you can retrace the
//! history of any INSEE code, modification codes included as comments.

use std::{
  fs::File,
  io::{BufRead, BufReader, Write},
  path::Path,
};

use anyhow::Context as _;
use chrono::NaiveDateTime;
use cogtrail_core::{store::Towns, town::Town};
use serde::Serialize;

#[derive(Serialize)]
struct Row {
  #[serde(rename = "ID")]
  id: String,
  #[serde(rename = "INSEE_CODE")]
  insee_code: String,
  #[serde(rename = "NAME")]
  name: String,
  #[serde(rename = "START_DATETIME")]
  start_datetime: String,
  #[serde(rename = "END_DATETIME")]
  end_datetime: String,
  #[serde(rename = "SUCCESSORS")]
  successors: String,
  #[serde(rename = "ANCESTORS")]
  ancestors: String,
  #[serde(rename = "POPULATION")]
  population: String,
  #[serde(rename = "COMMENT")]
  comment: String,
}

impl Row {
  fn from_town(town: &Town) -> Self {
    Self {
      id: town.id.to_string(),
      insee_code: town.depcom().to_string(),
      name: town.name.clone(),
      start_datetime: format_instant(town.start_datetime),
      end_datetime: format_instant(town.end_datetime),
      successors: join_ids(&town.successors),
      ancestors: join_ids(&town.ancestors),
      population: town.population.to_string(),
      comment: join_codes(&town.modification),
    }
  }
}

fn format_instant(instant: NaiveDateTime) -> String {
  instant.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

fn join_ids(ids: &[cogtrail_core::town::TownId]) -> String {
  ids
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join(";")
}

fn join_codes(codes: &[u16]) -> String {
  codes
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join(";")
}

/// Write every interval in the store.
pub fn write_full(path: &Path, towns: &Towns) -> anyhow::Result<()> {
  write_rows(path, towns.iter())
}

/// Write the intervals valid at one instant — a point-in-time snapshot.
pub fn write_valid_at(
  path: &Path,
  towns: &Towns,
  instant: NaiveDateTime,
) -> anyhow::Result<()> {
  write_rows(path, towns.valid_at(instant, None).into_iter())
}

fn write_rows<'a>(
  path: &Path,
  towns: impl Iterator<Item = &'a Town>,
) -> anyhow::Result<()> {
  let mut writer = csv::Writer::from_path(path)
    .with_context(|| format!("creating {}", path.display()))?;
  for town in towns {
    writer.serialize(Row::from_town(town))?;
  }
  writer.flush()?;
  Ok(())
}

/// Write a `_head` extract of an already-written export, for quick eyes.
pub fn write_head(path: &Path, lines: usize) -> anyhow::Result<()> {
  let source = File::open(path)
    .with_context(|| format!("reading back {}", path.display()))?;
  let head_path = head_path_for(path);
  let mut out = File::create(&head_path)
    .with_context(|| format!("creating {}", head_path.display()))?;
  for line in BufReader::new(source).lines().take(lines) {
    writeln!(out, "{}", line?)?;
  }
  Ok(())
}

fn head_path_for(path: &Path) -> std::path::PathBuf {
  let stem = path.file_stem().unwrap_or_default().to_string_lossy();
  let extension = path.extension().unwrap_or_default().to_string_lossy();
  path.with_file_name(format!("{stem}_head.{extension}"))
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use cogtrail_core::town::{Population, TownPatch};

  use super::*;

  #[test]
  fn instants_render_like_the_reference_export() {
    let midnight = NaiveDate::from_ymd_opt(2008, 10, 6)
      .unwrap()
      .and_hms_opt(0, 0, 0)
      .unwrap();
    assert_eq!(format_instant(midnight), "2008-10-06 00:00:00");
    let end_of_day = NaiveDate::from_ymd_opt(2008, 10, 5)
      .unwrap()
      .and_hms_micro_opt(23, 59, 59, 999_999)
      .unwrap();
    assert_eq!(format_instant(end_of_day), "2008-10-05 23:59:59.999999");
  }

  #[test]
  fn rows_join_relations_with_semicolons() {
    let other = Town::initial("10", "036", "Beauvoir-sur-Sarce");
    let third = Town::initial("10", "037", "Témoin");
    let town = Town::initial("10", "058", "Bragelogne")
      .derive(TownPatch {
        modification: Some(vec![330, 110]),
        ..TownPatch::default()
      })
      .unwrap()
      .with_successor(other.id.clone())
      .with_successor(third.id.clone())
      .with_population(Population::Unknown);
    let row = Row::from_town(&town);
    assert_eq!(row.insee_code, "10058");
    assert_eq!(
      row.successors,
      "10036@1942-01-01;10037@1942-01-01"
    );
    assert_eq!(row.comment, "330;110");
    assert_eq!(row.population, "NULL");
  }
}
