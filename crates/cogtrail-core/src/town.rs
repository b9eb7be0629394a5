//! Town — the interval entity at the heart of the timeline.
//!
//! A "town" in the exported history is really the union of its
//! interval-entities over time: one [`Town`] value per validity window,
//! keyed by [`TownId`] (INSEE code + window start date). Values are never
//! mutated in place; every transformation derives a fresh copy through
//! [`Town::derive`], the single choke point where the interval invariant
//! is enforced.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Temporal bounds ─────────────────────────────────────────────────────────

/// First date covered by the history records (the earliest event in the
/// registry is 1942-08-01; intervals open slightly before it so renamed
/// towns sharing an INSEE code get distinct ids).
pub const START_DATE: NaiveDate = NaiveDate::from_ymd_opt(1942, 1, 1).unwrap();

/// Sentinel date for intervals still in force.
pub const END_DATE: NaiveDate = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap();

pub const START_DATETIME: NaiveDateTime =
  NaiveDateTime::new(START_DATE, NaiveTime::MIN);

pub const END_DATETIME: NaiveDateTime = NaiveDateTime::new(
  END_DATE,
  NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap(),
);

/// The minimal representable step between two adjacent intervals.
///
/// Closing a predecessor at `eff - tick()` and opening its successor at
/// `eff` yields a gapless, overlap-free chain; the microsecond resolution
/// only ever serves to order events falling on the same calendar day.
pub fn tick() -> Duration { Duration::microseconds(1) }

/// `instant + tick`, saturating instead of overflowing near the end of
/// representable time so "still in force" entities stay probeable.
pub fn tick_after(instant: NaiveDateTime) -> NaiveDateTime {
  instant
    .checked_add_signed(tick())
    .unwrap_or(NaiveDateTime::MAX)
}

/// `instant - tick`, saturating at the beginning of representable time.
pub fn tick_before(instant: NaiveDateTime) -> NaiveDateTime {
  instant
    .checked_sub_signed(tick())
    .unwrap_or(NaiveDateTime::MIN)
}

// ─── TownId ──────────────────────────────────────────────────────────────────

/// Composite identity of one interval: INSEE code plus the date the
/// interval was opened, rendered as `depcom@YYYY-MM-DD`.
///
/// The date half is fixed when the interval is opened under this key; it
/// is not re-derived from later mutations (one special-case patch re-keys
/// an entity created under a wrong county code without touching its
/// datetimes).
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TownId {
  depcom:     String,
  start_date: NaiveDate,
}

impl TownId {
  pub fn new(depcom: impl Into<String>, start_date: NaiveDate) -> Self {
    Self { depcom: depcom.into(), start_date }
  }

  pub fn depcom(&self) -> &str { &self.depcom }

  pub fn start_date(&self) -> NaiveDate { self.start_date }
}

impl fmt::Display for TownId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}@{}", self.depcom, self.start_date)
  }
}

// ─── Population ──────────────────────────────────────────────────────────────

/// A resolved population figure. `Unknown` is distinct from `Known(0)`:
/// zero is the correct, final value for extinct towns on the "mortes"
/// roster, while `Unknown` renders as `NULL` in exports.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Population {
  Known(u32),
  #[default]
  Unknown,
}

impl fmt::Display for Population {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Known(count) => write!(f, "{count}"),
      Self::Unknown => write!(f, "NULL"),
    }
  }
}

// ─── Town ────────────────────────────────────────────────────────────────────

/// One time-bounded version of a municipality's identity.
///
/// The validity window `[start_datetime, end_datetime]` is closed on both
/// ends. `successors` lists the intervals this one transitions into at its
/// end instant (insertion order is meaningful); `ancestors` is the inverse
/// relation, populated only after the whole replay by the graph deriver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Town {
  pub id:             TownId,
  /// Current name (NCCENR with its article applied).
  pub name:           String,
  pub dep:            String,
  pub com:            String,
  pub start_datetime: NaiveDateTime,
  pub end_datetime:   NaiveDateTime,
  /// COG modification codes recorded against this interval.
  pub modification:   Vec<u16>,
  pub successors:     Vec<TownId>,
  pub ancestors:      Vec<TownId>,
  pub population:     Population,
}

/// Field overrides for [`Town::derive`]. Absent fields keep the source
/// town's value.
#[derive(Debug, Clone, Default)]
pub struct TownPatch {
  pub id:             Option<TownId>,
  pub start_datetime: Option<NaiveDateTime>,
  pub end_datetime:   Option<NaiveDateTime>,
  pub name:           Option<String>,
  pub modification:   Option<Vec<u16>>,
  pub successors:     Option<Vec<TownId>>,
}

impl Town {
  /// A fresh interval covering the whole recorded era, as loaded from the
  /// registry snapshot.
  pub fn initial(
    dep: impl Into<String>,
    com: impl Into<String>,
    name: impl Into<String>,
  ) -> Self {
    let dep = dep.into();
    let com = com.into();
    let depcom = format!("{dep}{com}");
    Self {
      id: TownId::new(depcom, START_DATE),
      name: name.into(),
      dep,
      com,
      start_datetime: START_DATETIME,
      end_datetime: END_DATETIME,
      modification: Vec::new(),
      successors: Vec::new(),
      ancestors: Vec::new(),
      population: Population::Unknown,
    }
  }

  pub fn depcom(&self) -> &str { self.id.depcom() }

  pub fn start_date(&self) -> NaiveDate { self.start_datetime.date() }

  pub fn end_date(&self) -> NaiveDate { self.end_datetime.date() }

  /// Whether the validity window covers `instant` (both bounds included).
  pub fn valid_at(&self, instant: NaiveDateTime) -> bool {
    self.start_datetime <= instant && instant <= self.end_datetime
  }

  /// Derive a modified copy. The one place interval construction is
  /// validated: a window that does not start strictly before it ends is
  /// rejected, and re-keying under another INSEE code re-splits the
  /// `dep`/`com` components so id and code fields cannot drift apart.
  pub fn derive(&self, patch: TownPatch) -> Result<Self> {
    let mut town = self.clone();
    if let Some(id) = patch.id {
      if id.depcom() != town.id.depcom() {
        let (dep, com) = split_depcom(id.depcom());
        town.dep = dep;
        town.com = com;
      }
      town.id = id;
    }
    if let Some(start) = patch.start_datetime {
      town.start_datetime = start;
    }
    if let Some(end) = patch.end_datetime {
      town.end_datetime = end;
    }
    if let Some(name) = patch.name {
      town.name = name;
    }
    if let Some(modification) = patch.modification {
      town.modification = modification;
    }
    if let Some(successors) = patch.successors {
      town.successors = successors;
    }
    if town.start_datetime >= town.end_datetime {
      return Err(Error::InvalidInterval {
        id:    town.id,
        start: town.start_datetime,
        end:   town.end_datetime,
      });
    }
    Ok(town)
  }

  /// Copy with `successor` appended to the (ordered) successor list.
  pub fn with_successor(&self, successor: TownId) -> Self {
    let mut town = self.clone();
    town.successors.push(successor);
    town
  }

  /// Copy with every occurrence of `old` in the successor list replaced
  /// by `new`, or removed when `new` is `None`.
  pub fn replace_successor(&self, old: &TownId, new: Option<TownId>) -> Self {
    let mut town = self.clone();
    town.successors = self
      .successors
      .iter()
      .filter_map(|id| {
        if id == old {
          new.clone()
        } else {
          Some(id.clone())
        }
      })
      .collect();
    town
  }

  /// Copy with `ancestor` appended (no dedup — distinct predecessors
  /// naturally accumulate).
  pub fn with_ancestor(&self, ancestor: TownId) -> Self {
    let mut town = self.clone();
    town.ancestors.push(ancestor);
    town
  }

  pub fn with_population(&self, population: Population) -> Self {
    let mut town = self.clone();
    town.population = population;
    town
  }
}

impl fmt::Display for Town {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "<Town ({}): {} from {} to {}>",
      self.id,
      self.name,
      self.start_date(),
      self.end_date()
    )
  }
}

/// Split an INSEE code into department and commune parts. Overseas codes
/// (`97x`) carry a 3-digit department.
fn split_depcom(depcom: &str) -> (String, String) {
  let cut = if depcom.starts_with("97") { 3 } else { 2 };
  let cut = cut.min(depcom.len());
  (depcom[..cut].to_string(), depcom[cut..].to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn initial_spans_whole_era() {
    let town = Town::initial("13", "004", "Arles");
    assert_eq!(town.id, TownId::new("13004", START_DATE));
    assert_eq!(town.start_datetime, START_DATETIME);
    assert_eq!(town.end_datetime, END_DATETIME);
    assert_eq!(town.depcom(), "13004");
  }

  #[test]
  fn derive_rejects_inverted_interval() {
    let town = Town::initial("13", "004", "Arles");
    let result = town.derive(TownPatch {
      end_datetime: Some(START_DATETIME),
      ..TownPatch::default()
    });
    assert!(matches!(result, Err(Error::InvalidInterval { .. })));
  }

  #[test]
  fn derive_resplits_code_components_on_rekey() {
    let town = Town::initial("20", "001", "Afa");
    let moved = town
      .derive(TownPatch {
        id: Some(TownId::new(
          "2A001",
          NaiveDate::from_ymd_opt(1976, 1, 1).unwrap(),
        )),
        ..TownPatch::default()
      })
      .unwrap();
    assert_eq!(moved.dep, "2A");
    assert_eq!(moved.com, "001");
    assert_eq!(moved.depcom(), "2A001");
  }

  #[test]
  fn overseas_codes_split_on_three_digits() {
    assert_eq!(
      split_depcom("97105"),
      ("971".to_string(), "05".to_string())
    );
  }

  #[test]
  fn tick_saturates_at_end_of_time() {
    let probed = tick_after(NaiveDateTime::MAX);
    assert_eq!(probed, NaiveDateTime::MAX);
    // The sentinel itself is far from the representable maximum.
    assert!(tick_after(END_DATETIME) > END_DATETIME);
  }

  #[test]
  fn closing_one_tick_before_midnight_lands_on_end_of_day() {
    let eff = NaiveDate::from_ymd_opt(2008, 10, 6)
      .unwrap()
      .and_time(NaiveTime::MIN);
    let closed = tick_before(eff);
    assert_eq!(
      closed,
      NaiveDate::from_ymd_opt(2008, 10, 5)
        .unwrap()
        .and_hms_micro_opt(23, 59, 59, 999_999)
        .unwrap()
    );
  }

  #[test]
  fn replace_successor_can_drop_references() {
    let a = TownId::new("10058", START_DATE);
    let b = TownId::new("10036", START_DATE);
    let town = Town::initial("45", "117", "Creusy")
      .with_successor(a.clone())
      .with_successor(b.clone());
    let scrubbed = town.replace_successor(&a, None);
    assert_eq!(scrubbed.successors, vec![b]);
  }

  #[test]
  fn unknown_population_renders_as_null() {
    assert_eq!(Population::Unknown.to_string(), "NULL");
    assert_eq!(Population::Known(581).to_string(), "581");
  }
}
