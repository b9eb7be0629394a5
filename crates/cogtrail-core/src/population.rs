//! Population enrichment — lookups with ancestor-sum fallback.
//!
//! Population tables are keyed by `depcom + name` because INSEE codes are
//! recycled across merges; the name disambiguates which incarnation the
//! figure belongs to. Must run after ancestors are derived, so that towns
//! absorbed before the census can be summed from their parts.

use std::collections::{HashMap, HashSet};

use crate::{
  store::Towns,
  town::{Population, Town},
};

/// The four source tables: mainland census, municipal arrondissements
/// (Paris/Lyon/Marseille), overseas departments, and the fixed roster of
/// towns wiped out with no population by definition.
#[derive(Debug, Default, Clone)]
pub struct PopulationIndex {
  pub metropole:       HashMap<String, u32>,
  pub arrondissements: HashMap<String, u32>,
  pub dom:             HashMap<String, u32>,
  pub mortes:          HashSet<String>,
}

impl PopulationIndex {
  /// Lookup key for a town: `depcom + name`.
  pub fn key_for(town: &Town) -> String {
    format!("{}{}", town.depcom(), town.name)
  }

  /// Direct hit across the three count tables, then the extinct roster.
  /// Zero counts in the tables are treated as absent.
  fn table_lookup(&self, key: &str) -> Population {
    for table in [&self.metropole, &self.arrondissements, &self.dom] {
      match table.get(key) {
        Some(&count) if count > 0 => return Population::Known(count),
        _ => {}
      }
    }
    if self.mortes.contains(key) {
      Population::Known(0)
    } else {
      Population::Unknown
    }
  }

  /// Resolve a population for `key`, using `town`'s ancestors as a
  /// fallback when the tables have no direct figure.
  ///
  /// An `Unknown` ancestor contributes zero to the sum without poisoning
  /// it; `Unknown` only surfaces when nothing at all could be resolved
  /// and the key is not on the extinct roster.
  pub fn resolve(
    &self,
    key: &str,
    towns: &Towns,
    town: Option<&Town>,
  ) -> Population {
    if let Some(&count) = self.metropole.get(key) {
      if count > 0 {
        return Population::Known(count);
      }
    }
    let Some(town) = town else {
      return Population::Unknown;
    };

    let mut sum: u64 = 0;
    for ancestor_id in &town.ancestors {
      if let Some(ancestor) = towns.get(ancestor_id) {
        if let Population::Known(count) =
          self.table_lookup(&Self::key_for(ancestor))
        {
          sum += u64::from(count);
        }
      }
    }
    if sum > 0 {
      return Population::Known(u32::try_from(sum).unwrap_or(u32::MAX));
    }

    for table in [&self.arrondissements, &self.dom] {
      match table.get(key) {
        Some(&count) if count > 0 => return Population::Known(count),
        _ => {}
      }
    }
    if self.mortes.contains(key) {
      Population::Known(0)
    } else {
      Population::Unknown
    }
  }
}

/// Enrich every interval in the store with a resolved population.
pub fn compute_populations(index: &PopulationIndex, towns: &mut Towns) {
  let snapshot: Vec<Town> = towns.iter().cloned().collect();
  for town in snapshot {
    let key = PopulationIndex::key_for(&town);
    let population = index.resolve(&key, towns, Some(&town));
    towns.upsert(town.with_population(population));
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn index() -> PopulationIndex {
    let mut index = PopulationIndex::default();
    index.metropole.insert("13004Arles".into(), 52_566);
    index
      .metropole
      .insert("89334Saint-Aubin-Château-Neuf".into(), 517);
    index
      .metropole
      .insert("89356Saint-Martin-sur-Ocre".into(), 64);
    index
      .arrondissements
      .insert("13212Marseille 12e Arrondissement".into(), 57_908);
    index.dom.insert("97105Basse-Terre".into(), 11_150);
    index.mortes.insert("55050Bezonvaux".into());
    index
  }

  #[test]
  fn direct_metropole_hit() {
    let towns = Towns::new();
    assert_eq!(
      index().resolve("13004Arles", &towns, None),
      Population::Known(52_566)
    );
  }

  #[test]
  fn arrondissement_and_dom_fallbacks() {
    let index = index();
    let marseille =
      Town::initial("13", "212", "Marseille 12e Arrondissement");
    let basse_terre = Town::initial("971", "05", "Basse-Terre");
    let towns =
      Towns::from_iter([marseille.clone(), basse_terre.clone()]);
    assert_eq!(
      index.resolve(
        &PopulationIndex::key_for(&marseille),
        &towns,
        Some(&marseille)
      ),
      Population::Known(57_908)
    );
    assert_eq!(
      index.resolve(
        &PopulationIndex::key_for(&basse_terre),
        &towns,
        Some(&basse_terre)
      ),
      Population::Known(11_150)
    );
  }

  #[test]
  fn extinct_roster_resolves_to_zero_not_null() {
    let index = index();
    let bezonvaux = Town::initial("55", "050", "Bezonvaux");
    let towns = Towns::from_iter([bezonvaux.clone()]);
    assert_eq!(
      index.resolve(
        &PopulationIndex::key_for(&bezonvaux),
        &towns,
        Some(&bezonvaux)
      ),
      Population::Known(0)
    );
  }

  #[test]
  fn missing_everywhere_stays_unknown() {
    let index = index();
    let amareins = Town::initial("01", "003", "Amareins");
    let towns = Towns::from_iter([amareins.clone()]);
    assert_eq!(
      index.resolve(
        &PopulationIndex::key_for(&amareins),
        &towns,
        Some(&amareins)
      ),
      Population::Unknown
    );
  }

  #[test]
  fn ancestors_sum_when_the_merged_town_has_no_figure() {
    let index = index();
    let saint_aubin =
      Town::initial("89", "334", "Saint-Aubin-Château-Neuf");
    let saint_martin =
      Town::initial("89", "356", "Saint-Martin-sur-Ocre");
    // The pole recycles 89334 under a name absent from every table.
    let pole = saint_aubin
      .derive(crate::town::TownPatch {
        id: Some(crate::town::TownId::new(
          "89334",
          chrono::NaiveDate::from_ymd_opt(2016, 1, 1).unwrap(),
        )),
        start_datetime: Some(
          chrono::NaiveDate::from_ymd_opt(2016, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
        ),
        name: Some("Val d'Ocre".into()),
        ..Default::default()
      })
      .unwrap()
      .with_ancestor(saint_aubin.id.clone())
      .with_ancestor(saint_martin.id.clone());
    let towns =
      Towns::from_iter([saint_aubin, saint_martin, pole.clone()]);

    assert_eq!(
      index.resolve(&PopulationIndex::key_for(&pole), &towns, Some(&pole)),
      Population::Known(581)
    );
  }

  #[test]
  fn unknown_ancestors_contribute_zero() {
    let index = index();
    let known = Town::initial("89", "334", "Saint-Aubin-Château-Neuf");
    let nameless = Town::initial("01", "003", "Amareins");
    let pole = Town::initial("89", "999", "Fusion")
      .with_ancestor(known.id.clone())
      .with_ancestor(nameless.id.clone());
    let towns = Towns::from_iter([known, nameless, pole.clone()]);
    assert_eq!(
      index.resolve(&PopulationIndex::key_for(&pole), &towns, Some(&pole)),
      Population::Known(517)
    );
  }

  #[test]
  fn compute_populations_enriches_the_whole_store() {
    let index = index();
    let arles = Town::initial("13", "004", "Arles");
    let amareins = Town::initial("01", "003", "Amareins");
    let mut towns = Towns::from_iter([arles.clone(), amareins.clone()]);
    compute_populations(&index, &mut towns);
    assert_eq!(
      towns.get(&arles.id).unwrap().population,
      Population::Known(52_566)
    );
    assert_eq!(
      towns.get(&amareins.id).unwrap().population,
      Population::Unknown
    );
  }
}
