//! The temporal entity store.
//!
//! [`Towns`] owns every interval-entity and keeps the successor graph
//! consistent while handlers splice the timeline. It deliberately does
//! *not* check the no-overlap invariant on writes — handlers construct
//! windows through [`Town::derive`] and are responsible for closing a
//! predecessor before opening its successor.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::{
  Error, Result,
  town::{Town, TownId, tick_after},
};

/// Ordered collection of interval-entities keyed by [`TownId`].
///
/// Backed by a `BTreeMap`, so iteration, [`Towns::filter`] and everything
/// built on them are id-ordered and deterministic — required both for
/// reproducible exports and for correctly pairing "first match" lookups
/// when several records touch the same INSEE code in sequence.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Towns {
  towns: BTreeMap<TownId, Town>,
}

impl Towns {
  pub fn new() -> Self { Self::default() }

  pub fn len(&self) -> usize { self.towns.len() }

  pub fn is_empty(&self) -> bool { self.towns.is_empty() }

  pub fn contains(&self, id: &TownId) -> bool { self.towns.contains_key(id) }

  pub fn get(&self, id: &TownId) -> Option<&Town> { self.towns.get(id) }

  pub fn iter(&self) -> impl Iterator<Item = &Town> { self.towns.values() }

  // ── Writes ────────────────────────────────────────────────────────────

  /// Insert a brand-new entity. When `from` is given, every successor
  /// reference to `from` anywhere in the store is redirected to the new
  /// entity first — the new entity supersedes `from` in the graph.
  pub fn insert(&mut self, town: Town, from: Option<&Town>) -> Result<()> {
    if self.towns.contains_key(&town.id) {
      return Err(Error::TownExists(town.id));
    }
    if let Some(from) = from {
      self.redirect_successors(&from.id, Some(&town.id), None);
    }
    self.towns.insert(town.id.clone(), town);
    Ok(())
  }

  /// Overwrite an existing entity. When `to` is given and is valid
  /// immediately after `town`'s end instant, other entities that closed
  /// exactly at that instant and pointed at `town` are redirected to
  /// `to` — a record finalising one entity often has to drag its
  /// same-instant siblings along.
  pub fn update(&mut self, town: Town, to: Option<&Town>) -> Result<()> {
    if !self.towns.contains_key(&town.id) {
      return Err(Error::UnknownTown(town.id));
    }
    if let Some(to) = to {
      if to.valid_at(tick_after(town.end_datetime)) {
        self.redirect_successors(
          &town.id,
          Some(&to.id),
          Some(town.end_datetime),
        );
      }
    }
    self.towns.insert(town.id.clone(), town);
    Ok(())
  }

  /// Unconditional set; returns whether it inserted a new id.
  pub fn upsert(&mut self, town: Town) -> bool {
    self.towns.insert(town.id.clone(), town).is_none()
  }

  /// Remove an entity, scrubbing every successor reference to it first.
  pub fn delete(&mut self, id: &TownId) {
    self.redirect_successors(id, None, None);
    self.towns.remove(id);
  }

  /// Graph-repair primitive: rewrite successor lists that reference
  /// `old`, replacing the reference with `new` (or dropping it). With a
  /// `window_end`, only entities closing exactly at that instant (valid
  /// at it, no longer valid one tick later) are touched, protecting
  /// older, already-closed successor chains.
  fn redirect_successors(
    &mut self,
    old: &TownId,
    new: Option<&TownId>,
    window_end: Option<NaiveDateTime>,
  ) {
    let targets: Vec<TownId> = self
      .towns
      .values()
      .filter(|town| {
        let in_window = window_end.is_none_or(|end| {
          town.valid_at(end) && !town.valid_at(tick_after(end))
        });
        in_window && town.successors.iter().any(|id| id == old)
      })
      .map(|town| town.id.clone())
      .collect();

    for id in targets {
      if let Some(town) = self.towns.get(&id) {
        tracing::debug!(
          entity = %id,
          from = %old,
          to = new.map(ToString::to_string).unwrap_or_default(),
          "redirecting successor reference"
        );
        let rewritten = town.replace_successor(old, new.cloned());
        self.towns.insert(id, rewritten);
      }
    }
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// All intervals recorded for an INSEE code, id-ordered.
  pub fn filter(&self, depcom: &str) -> Vec<&Town> {
    let from = TownId::new(depcom, NaiveDate::MIN);
    let to = TownId::new(depcom, NaiveDate::MAX);
    self.towns.range(from..=to).map(|(_, town)| town).collect()
  }

  /// The interval with the highest end instant for an INSEE code; ties
  /// resolve to the lowest id. Errors only when the code was never
  /// recorded at all.
  pub fn latest(&self, depcom: &str) -> Result<&Town> {
    let mut best: Option<&Town> = None;
    for town in self.filter(depcom) {
      match best {
        Some(current) if town.end_datetime <= current.end_datetime => {}
        _ => best = Some(town),
      }
    }
    best.ok_or_else(|| Error::MissingTown(depcom.to_string()))
  }

  /// All intervals covering `instant`, optionally restricted to one INSEE
  /// code.
  pub fn valid_at(
    &self,
    instant: NaiveDateTime,
    depcom: Option<&str>,
  ) -> Vec<&Town> {
    match depcom {
      Some(depcom) => self
        .filter(depcom)
        .into_iter()
        .filter(|town| town.valid_at(instant))
        .collect(),
      None => self
        .towns
        .values()
        .filter(|town| town.valid_at(instant))
        .collect(),
    }
  }

  /// The interval covering `instant` for an INSEE code, falling back to
  /// the latest interval when the instant lies in a gap or outside stored
  /// ranges. The fallback is a deliberate best-effort policy over an
  /// inconsistent upstream registry, letting the replay proceed where
  /// aborting would lose the whole chain.
  pub fn get_current(
    &self,
    depcom: &str,
    instant: NaiveDateTime,
  ) -> Result<&Town> {
    match self.valid_at(instant, Some(depcom)).first() {
      Some(town) => Ok(town),
      None => self.latest(depcom),
    }
  }

  /// Entities with a non-empty successor list.
  pub fn with_successors(&self) -> impl Iterator<Item = &Town> {
    self.towns.values().filter(|town| !town.successors.is_empty())
  }
}

/// Bulk-load the initial snapshot.
impl FromIterator<Town> for Towns {
  fn from_iter<I: IntoIterator<Item = Town>>(towns: I) -> Self {
    Self {
      towns: towns
        .into_iter()
        .map(|town| (town.id.clone(), town))
        .collect(),
    }
  }
}

impl<'a> IntoIterator for &'a Towns {
  type Item = &'a Town;
  type IntoIter = std::collections::btree_map::Values<'a, TownId, Town>;

  fn into_iter(self) -> Self::IntoIter { self.towns.values() }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::town::{END_DATETIME, START_DATE, TownPatch, tick_before};

  fn midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
      .unwrap()
      .and_hms_opt(0, 0, 0)
      .unwrap()
  }

  #[test]
  fn insert_rejects_duplicates() {
    let mut towns = Towns::new();
    towns.insert(Town::initial("13", "004", "Arles"), None).unwrap();
    let result = towns.insert(Town::initial("13", "004", "Arles"), None);
    assert!(matches!(result, Err(Error::TownExists(_))));
  }

  #[test]
  fn update_rejects_unknown_ids() {
    let mut towns = Towns::new();
    let result = towns.update(Town::initial("13", "004", "Arles"), None);
    assert!(matches!(result, Err(Error::UnknownTown(_))));
  }

  #[test]
  fn filter_is_id_ordered() {
    let first = Town::initial("15", "268", "Rouget-Pers");
    let second = first
      .derive(TownPatch {
        id: Some(TownId::new(
          "15268",
          NaiveDate::from_ymd_opt(1945, 9, 17).unwrap(),
        )),
        start_datetime: Some(midnight(1945, 9, 17)),
        ..TownPatch::default()
      })
      .unwrap();
    let mut towns = Towns::new();
    towns.insert(second.clone(), None).unwrap();
    towns.insert(first.clone(), None).unwrap();
    let filtered = towns.filter("15268");
    assert_eq!(filtered, vec![&first, &second]);
  }

  #[test]
  fn get_current_falls_back_to_latest_in_gaps() {
    let open = Town::initial("45", "117", "Creusy");
    let closed = open
      .derive(TownPatch {
        end_datetime: Some(tick_before(midnight(1965, 1, 1))),
        ..TownPatch::default()
      })
      .unwrap();
    let mut towns = Towns::new();
    towns.insert(closed.clone(), None).unwrap();
    // 1970 lies after the only interval; the latest one is returned.
    let current = towns.get_current("45117", midnight(1970, 1, 1)).unwrap();
    assert_eq!(current.id, closed.id);
    // A code never recorded at all is a hard error.
    assert!(matches!(
      towns.get_current("99999", midnight(1970, 1, 1)),
      Err(Error::MissingTown(_))
    ));
  }

  #[test]
  fn delete_scrubs_references() {
    let target = Town::initial("24", "516", "Salignac-Eyvigues");
    let pointing =
      Town::initial("24", "169", "Eyvignes").with_successor(target.id.clone());
    let mut towns = Towns::new();
    towns.insert(target.clone(), None).unwrap();
    towns.insert(pointing.clone(), None).unwrap();
    towns.delete(&target.id);
    assert!(towns.filter("24169")[0].successors.is_empty());
    assert!(towns.filter("24516").is_empty());
  }

  #[test]
  fn update_redirects_only_same_instant_siblings() {
    let end = tick_before(midnight(1973, 5, 1));
    let old = Town::initial("10", "058", "Bragelogne")
      .derive(TownPatch {
        end_datetime: Some(end),
        ..TownPatch::default()
      })
      .unwrap();
    // Closed at the same instant, pointing at `old`.
    let sibling = Town::initial("10", "036", "Beauvoir-sur-Sarce")
      .derive(TownPatch {
        end_datetime: Some(end),
        ..TownPatch::default()
      })
      .unwrap()
      .with_successor(old.id.clone());
    // Closed earlier, also pointing at `old`; must not be touched.
    let older = Town::initial("10", "999", "Témoin")
      .derive(TownPatch {
        end_datetime: Some(tick_before(midnight(1960, 1, 1))),
        ..TownPatch::default()
      })
      .unwrap()
      .with_successor(old.id.clone());
    let replacement = old
      .derive(TownPatch {
        id: Some(TownId::new(
          "10058",
          NaiveDate::from_ymd_opt(1973, 5, 1).unwrap(),
        )),
        start_datetime: Some(midnight(1973, 5, 1)),
        end_datetime: Some(END_DATETIME),
        ..TownPatch::default()
      })
      .unwrap();

    let mut towns = Towns::new();
    towns.insert(old.clone(), None).unwrap();
    towns.insert(sibling, None).unwrap();
    towns.insert(older, None).unwrap();
    towns.insert(replacement.clone(), None).unwrap();
    towns.update(old, Some(&replacement)).unwrap();

    assert_eq!(
      towns.filter("10036")[0].successors,
      vec![replacement.id.clone()]
    );
    assert_eq!(
      towns.filter("10999")[0].successors,
      vec![TownId::new("10058", START_DATE)]
    );
  }

  #[test]
  fn upsert_reports_insertion() {
    let mut towns = Towns::new();
    let town = Town::initial("13", "004", "Arles");
    assert!(towns.upsert(town.clone()));
    assert!(!towns.upsert(town));
  }
}
