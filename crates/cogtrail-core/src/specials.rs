//! Special cases handled manually.
//!
//! A fixed catalog of patches, one per INSEE code whose feed records the
//! generic rules cannot untangle: items ordered against causality,
//! missing or duplicated records for a transition, or 3+ renames and
//! mergers within a single day. Patches run strictly after the generic
//! replay.
//!
//! Each patch is guarded twice: it only runs when its code is present in
//! the store (so the catalog can run against partial fixtures), and it
//! checks the interval layout it is about to manipulate — a second
//! application finds the guard false or rewrites the same values, making
//! the whole overlay idempotent.

use chrono::NaiveDate;

use crate::{
  Result,
  store::Towns,
  town::{Town, TownId, TownPatch, tick_after, tick_before},
};

/// One named patch, scoped to a single INSEE code.
pub struct SpecialCase {
  pub name:   &'static str,
  pub depcom: &'static str,
  pub apply:  fn(&mut Towns) -> Result<()>,
}

/// The catalog, in application order. Order must not matter for the final
/// state; it is fixed here so that runs are reproducible.
pub const SPECIAL_CASES: &[SpecialCase] = &[
  SpecialCase {
    name:   "chemille-en-anjou",
    depcom: "49092",
    apply:  chemille_en_anjou,
  },
  SpecialCase {
    name:   "charbonnieres-les-sapins",
    depcom: "25123",
    apply:  charbonnieres_les_sapins,
  },
  SpecialCase { name: "dommerville", depcom: "28131", apply: dommerville },
  SpecialCase {
    name:   "crepieux-la-pape",
    depcom: "69274",
    apply:  crepieux_la_pape,
  },
  SpecialCase { name: "congerville", depcom: "91173", apply: congerville },
  SpecialCase { name: "blamecourt", depcom: "95065", apply: blamecourt },
  SpecialCase { name: "arthieul", depcom: "95025", apply: arthieul },
  SpecialCase { name: "chisa", depcom: "20366", apply: chisa },
  SpecialCase {
    name:   "butry-sur-oise",
    depcom: "78692",
    apply:  butry_sur_oise,
  },
  SpecialCase { name: "tivolaggio", depcom: "2A325", apply: tivolaggio },
  SpecialCase { name: "labergement", depcom: "25319", apply: labergement },
  SpecialCase { name: "villalet", depcom: "27688", apply: villalet },
  SpecialCase { name: "pezy", depcom: "28297", apply: pezy },
  SpecialCase { name: "rocourt", depcom: "88392", apply: rocourt },
  SpecialCase { name: "langrolay", depcom: "22103", apply: langrolay },
  SpecialCase { name: "orvanne", depcom: "77316", apply: orvanne },
  SpecialCase { name: "noyers", depcom: "14475", apply: noyers },
  SpecialCase { name: "morannes", depcom: "49220", apply: morannes },
  SpecialCase { name: "madine", depcom: "55245", apply: madine },
  SpecialCase {
    name:   "sainte-alvere",
    depcom: "24362",
    apply:  sainte_alvere,
  },
];

/// Apply every patch whose INSEE code is present in the store.
pub fn apply_special_cases(towns: &mut Towns) -> Result<()> {
  for case in SPECIAL_CASES {
    if towns.filter(case.depcom).is_empty() {
      continue;
    }
    tracing::debug!(patch = case.name, depcom = case.depcom, "applying");
    (case.apply)(towns)?;
  }
  Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn day(year: i32, month: u32, day: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(year, month, day).expect("valid calendar date")
}

/// Clone the `index`-th interval recorded for `depcom`, if any.
fn nth(towns: &Towns, depcom: &str, index: usize) -> Option<Town> {
  towns.filter(depcom).get(index).map(|town| (*town).clone())
}

/// Clone all intervals for `depcom` only when exactly `count` exist — the
/// shape guard that keeps count-changing patches idempotent.
fn exactly(towns: &Towns, depcom: &str, count: usize) -> Option<Vec<Town>> {
  let found: Vec<Town> =
    towns.filter(depcom).into_iter().cloned().collect();
  (found.len() == count).then_some(found)
}

/// Overwrite the successor list of the `index`-th interval for `depcom`.
fn repoint(
  towns: &mut Towns,
  depcom: &str,
  index: usize,
  successors: Vec<TownId>,
) -> Result<()> {
  if let Some(town) = nth(towns, depcom, index) {
    let town = town.derive(TownPatch {
      successors: Some(successors),
      ..TownPatch::default()
    })?;
    towns.upsert(town);
  }
  Ok(())
}

/// Swap one successor reference on the `index`-th interval for `depcom`.
fn swap_successor(
  towns: &mut Towns,
  depcom: &str,
  index: usize,
  old: TownId,
  new: TownId,
) {
  if let Some(town) = nth(towns, depcom, index) {
    towns.upsert(town.replace_successor(&old, Some(new)));
  }
}

// ─── Patches ─────────────────────────────────────────────────────────────────

/// Feed items for Chemillé are ordered so that the "last" merge record is
/// not the last one; the intermediate Chemillé-Melay interval never gets
/// spliced in.
fn chemille_en_anjou(towns: &mut Towns) -> Result<()> {
  let Some([chemille, melay, en_anjou]): Option<[Town; 3]> =
    exactly(towns, "49092", 3).map(|v| v.try_into().ok()).flatten()
  else {
    return Ok(());
  };
  towns
    .upsert(chemille.replace_successor(&en_anjou.id, Some(melay.id.clone())));
  let melay = melay.derive(TownPatch {
    end_datetime: Some(tick_before(en_anjou.start_datetime)),
    successors: Some(vec![en_anjou.id.clone()]),
    ..TownPatch::default()
  })?;
  towns.upsert(melay);
  // The other participants all merged straight into the final pole.
  repoint(towns, "49111", 0, vec![en_anjou.id.clone()])?;
  repoint(towns, "49169", 0, vec![en_anjou.id.clone()])?;
  repoint(towns, "49225", 0, vec![en_anjou.id.clone()])?;
  repoint(towns, "49268", 0, vec![en_anjou.id.clone()])?;
  repoint(towns, "49281", 1, vec![en_anjou.id.clone()])?;
  repoint(towns, "49300", 0, vec![en_anjou.id.clone()])?;
  repoint(towns, "49325", 0, vec![en_anjou.id.clone()])?;
  repoint(towns, "49351", 0, vec![en_anjou.id.clone()])?;
  repoint(towns, "49153", 1, vec![en_anjou.id])
}

/// Merged while its successor's interval did not exist yet.
fn charbonnieres_les_sapins(towns: &mut Towns) -> Result<()> {
  swap_successor(
    towns,
    "25123",
    0,
    TownId::new("25222", day(1942, 1, 1)),
    TownId::new("25222", day(2017, 1, 1)),
  );
  Ok(())
}

/// County changed, successor reference never updated.
fn dommerville(towns: &mut Towns) -> Result<()> {
  swap_successor(
    towns,
    "28131",
    0,
    TownId::new("91016", day(1942, 1, 1)),
    TownId::new("91016", day(1968, 1, 1)),
  );
  Ok(())
}

/// County changed, successor reference never updated.
fn crepieux_la_pape(towns: &mut Towns) -> Result<()> {
  swap_successor(
    towns,
    "69274",
    0,
    TownId::new("69286", day(1942, 1, 1)),
    TownId::new("69286", day(1972, 12, 15)),
  );
  Ok(())
}

/// County changed, successor reference never updated.
fn congerville(towns: &mut Towns) -> Result<()> {
  swap_successor(
    towns,
    "91173",
    0,
    TownId::new("91613", day(1942, 1, 1)),
    TownId::new("91613", day(1974, 1, 1)),
  );
  Ok(())
}

/// Fused away before its county change; the registry is ambiguous about
/// which side survived. Give the leftover interval a one-tick lifespan
/// and point it at the post-change successor.
fn blamecourt(towns: &mut Towns) -> Result<()> {
  let Some(current) = nth(towns, "95065", 0) else {
    return Ok(());
  };
  let shrunk = current.derive(TownPatch {
    end_datetime: Some(tick_after(current.start_datetime)),
    ..TownPatch::default()
  })?;
  towns.upsert(shrunk.replace_successor(
    &TownId::new("95355", day(1942, 1, 1)),
    Some(TownId::new("95355", day(1968, 1, 1))),
  ));
  Ok(())
}

/// Same situation as Blamécourt, same merger, same county change.
fn arthieul(towns: &mut Towns) -> Result<()> {
  let Some(current) = nth(towns, "95025", 0) else {
    return Ok(());
  };
  let shrunk = current.derive(TownPatch {
    end_datetime: Some(tick_after(current.start_datetime)),
    ..TownPatch::default()
  })?;
  towns.upsert(shrunk.replace_successor(
    &TownId::new("95355", day(1942, 1, 1)),
    Some(TownId::new("95355", day(1968, 1, 1))),
  ));
  Ok(())
}

/// Created after 1942, moved from 20 to 2B later; the county change kept
/// the interval keyed under the old code.
fn chisa(towns: &mut Towns) -> Result<()> {
  let Some(found) = exactly(towns, "20366", 2) else {
    return Ok(());
  };
  let wrong = &found[0];
  let rekeyed = wrong.derive(TownPatch {
    id: Some(TownId::new("2B366", day(1976, 1, 1))),
    ..TownPatch::default()
  })?;
  towns.upsert(rekeyed);
  towns.delete(&wrong.id);
  Ok(())
}

/// Same as Chisa for the 78 → 95 transfer.
fn butry_sur_oise(towns: &mut Towns) -> Result<()> {
  let Some(found) = exactly(towns, "78692", 2) else {
    return Ok(());
  };
  let wrong = &found[0];
  let rekeyed = wrong.derive(TownPatch {
    id: Some(TownId::new("95120", day(1968, 1, 1))),
    ..TownPatch::default()
  })?;
  towns.upsert(rekeyed);
  towns.delete(&wrong.id);
  Ok(())
}

/// County changed; the successor interval was never created under the
/// new code.
fn tivolaggio(towns: &mut Towns) -> Result<()> {
  swap_successor(
    towns,
    "2A325",
    0,
    TownId::new("2A249", day(1976, 1, 1)),
    TownId::new("20249", day(1942, 1, 1)),
  );
  Ok(())
}

/// Successor changed on the same date as the merger.
fn labergement(towns: &mut Towns) -> Result<()> {
  swap_successor(
    towns,
    "25319",
    0,
    TownId::new("25334", day(1942, 1, 1)),
    TownId::new("25334", day(2017, 1, 1)),
  );
  Ok(())
}

/// Successor changed on the same date as the merger.
fn villalet(towns: &mut Towns) -> Result<()> {
  swap_successor(
    towns,
    "27688",
    0,
    TownId::new("27693", day(1972, 10, 1)),
    TownId::new("27693", day(2016, 1, 1)),
  );
  Ok(())
}

/// Successor changed on the same date as the merger.
fn pezy(towns: &mut Towns) -> Result<()> {
  swap_successor(
    towns,
    "28297",
    0,
    TownId::new("28383", day(1942, 1, 1)),
    TownId::new("28383", day(2016, 1, 1)),
  );
  Ok(())
}

/// Successor changed on the same date as the merger.
fn rocourt(towns: &mut Towns) -> Result<()> {
  swap_successor(
    towns,
    "88392",
    0,
    TownId::new("88475", day(1942, 1, 1)),
    TownId::new("88475", day(2017, 1, 1)),
  );
  Ok(())
}

/// Successor changed on the same date as the merger; the middle interval
/// of the rename chain carries the stale reference.
fn langrolay(towns: &mut Towns) -> Result<()> {
  if towns.filter("22103").len() != 3 {
    return Ok(());
  }
  swap_successor(
    towns,
    "22103",
    1,
    TownId::new("22213", day(1942, 1, 1)),
    TownId::new("22213", day(1973, 3, 15)),
  );
  Ok(())
}

/// Four name states within two mergers; the generic rules skip the two
/// middle intervals.
fn orvanne(towns: &mut Towns) -> Result<()> {
  let Some([moret, orvanne, moret_orvanne, with_hyphens]): Option<[Town; 4]> =
    exactly(towns, "77316", 4).map(|v| v.try_into().ok()).flatten()
  else {
    return Ok(());
  };
  towns.upsert(
    moret.replace_successor(&moret_orvanne.id, Some(orvanne.id.clone())),
  );
  let orvanne = orvanne.derive(TownPatch {
    end_datetime: Some(tick_before(moret_orvanne.start_datetime)),
    successors: Some(vec![moret_orvanne.id.clone()]),
    ..TownPatch::default()
  })?;
  towns.upsert(orvanne.clone());
  let moret_orvanne = moret_orvanne.derive(TownPatch {
    end_datetime: Some(tick_before(with_hyphens.start_datetime)),
    successors: Some(vec![with_hyphens.id.clone()]),
    ..TownPatch::default()
  })?;
  towns.upsert(moret_orvanne);
  // Écuelles merged at the first step, Veneux-les-Sablons at the last.
  repoint(towns, "77166", 0, vec![orvanne.id])?;
  repoint(towns, "77491", 0, vec![with_hyphens.id])
}

/// Noyers went through Noyers-Bocage, Noyers-Missy and Val d'Arry; the
/// middle interval never gets closed by the generic rules.
fn noyers(towns: &mut Towns) -> Result<()> {
  let Some([_noyers, bocage, noyers_missy, val_arry]): Option<[Town; 4]> =
    exactly(towns, "14475", 4).map(|v| v.try_into().ok()).flatten()
  else {
    return Ok(());
  };
  towns.upsert(
    bocage.replace_successor(&val_arry.id, Some(noyers_missy.id.clone())),
  );
  let noyers_missy = noyers_missy.derive(TownPatch {
    end_datetime: Some(tick_before(val_arry.start_datetime)),
    successors: Some(vec![val_arry.id.clone()]),
    ..TownPatch::default()
  })?;
  towns.upsert(noyers_missy.clone());
  repoint(towns, "14432", 0, vec![noyers_missy.id])?;
  repoint(towns, "14702", 1, vec![val_arry.id])
}

/// Morannes reached Morannes-sur-Sarthe-Daumeray through an intermediate
/// state the feed never records; splice it in by hand.
fn morannes(towns: &mut Towns) -> Result<()> {
  let Some([morannes, daumeray]): Option<[Town; 2]> =
    exactly(towns, "49220", 2).map(|v| v.try_into().ok()).flatten()
  else {
    return Ok(());
  };
  let start = tick_after(morannes.end_datetime);
  let sur_sarthe = morannes
    .derive(TownPatch {
      id: Some(TownId::new("49220", start.date())),
      start_datetime: Some(start),
      end_datetime: Some(tick_before(daumeray.start_datetime)),
      successors: Some(vec![daumeray.id.clone()]),
      ..TownPatch::default()
    })?;
  towns.upsert(sur_sarthe.clone());
  towns
    .upsert(morannes.replace_successor(&daumeray.id, Some(sur_sarthe.id.clone())));
  repoint(towns, "49093", 0, vec![sur_sarthe.id])
}

/// Lamarche-en-Woëvre, Nonsard and Heudicourt merged into Madine and
/// split back apart within the same registry day.
fn madine(towns: &mut Towns) -> Result<()> {
  let Some([_heudicourt1, madine, heudicourt2]): Option<[Town; 3]> =
    exactly(towns, "55245", 3).map(|v| v.try_into().ok()).flatten()
  else {
    return Ok(());
  };
  let Some([_lamarche1, lamarche2]): Option<[Town; 2]> =
    exactly(towns, "55273", 2).map(|v| v.try_into().ok()).flatten()
  else {
    return Ok(());
  };
  let Some([nonsard, nonsard_lamarche]): Option<[Town; 2]> =
    exactly(towns, "55386", 2).map(|v| v.try_into().ok()).flatten()
  else {
    return Ok(());
  };
  let madine = madine.derive(TownPatch {
    successors: Some(vec![
      heudicourt2.id,
      lamarche2.id.clone(),
      nonsard_lamarche.id.clone(),
    ]),
    ..TownPatch::default()
  })?;
  towns.upsert(madine.clone());
  let nonsard = nonsard.derive(TownPatch {
    end_datetime: Some(tick_before(madine.start_datetime)),
    successors: Some(vec![madine.id]),
    ..TownPatch::default()
  })?;
  towns.upsert(nonsard);
  towns.upsert(
    lamarche2
      .derive(TownPatch {
        successors: Some(vec![nonsard_lamarche.id]),
        ..TownPatch::default()
      })?,
  );
  Ok(())
}

/// Sainte-Alvère chained three mergers and a gender rename; the two
/// middle intervals never get linked.
fn sainte_alvere(towns: &mut Towns) -> Result<()> {
  let Some([_st, ste_alvere, st_laurent, val_louyre]): Option<[Town; 4]> =
    exactly(towns, "24362", 4).map(|v| v.try_into().ok()).flatten()
  else {
    return Ok(());
  };
  towns.upsert(ste_alvere.derive(TownPatch {
    successors: Some(vec![st_laurent.id.clone()]),
    ..TownPatch::default()
  })?);
  let st_laurent = st_laurent.derive(TownPatch {
    end_datetime: Some(tick_before(val_louyre.start_datetime)),
    successors: Some(vec![val_louyre.id]),
    ..TownPatch::default()
  })?;
  towns.upsert(st_laurent);
  Ok(())
}
