//! Action dispatch — one handler per modification-type category.
//!
//! Every handler follows the same shape: fetch the interval currently
//! valid for the record's INSEE code, derive one or two replacement
//! intervals, insert/update/delete, repair successor references. The
//! dispatch table is a static array so the code→handler mapping can be
//! inspected and exercised in isolation.
//!
//! Record order is semantically load-bearing: later records rely on the
//! store state left by earlier ones, so [`replay`] walks the history in
//! source order and aborts on the first handler failure after logging the
//! offending record.

use crate::{
  Error, Result,
  record::{
    CHANGE_COUNTY, CHANGE_NAME, CHANGE_NAME_CREATION, CHANGE_NAME_FUSION,
    CHANGE_NAME_REINSTATEMENT, CREATION, CREATION_DELEGATED,
    CREATION_DELEGATED_POLE, CREATION_NOT_DELEGATED,
    CREATION_NOT_DELEGATED_POLE, Change, DELETION_FUSION, DELETION_PARTITION,
    FUSION_ASSOCIATION_ASSOCIATED, OBSOLETE, REINSTATEMENT, SPLITING,
  },
  store::Towns,
  town::{
    END_DATETIME, START_DATE, START_DATETIME, TownId, TownPatch, tick_after,
    tick_before,
  },
};

pub type Handler = fn(&mut Towns, &Change) -> Result<()>;

/// Modification code → handler. Codes absent from this table flow through
/// the replay untouched.
pub const DISPATCH: &[(u16, Handler)] = &[
  (CHANGE_NAME, change_name),
  (CHANGE_NAME_FUSION, change_name),
  (CHANGE_NAME_CREATION, creation),
  (CHANGE_NAME_REINSTATEMENT, reinstatement),
  (CREATION, creation),
  (REINSTATEMENT, reinstatement),
  (SPLITING, spliting),
  (DELETION_PARTITION, deletion),
  (DELETION_FUSION, deletion),
  (CREATION_NOT_DELEGATED, creation_not_delegated),
  (FUSION_ASSOCIATION_ASSOCIATED, deletion),
  (CREATION_DELEGATED, deletion),
  (CREATION_DELEGATED_POLE, creation_delegated_pole),
  (CHANGE_COUNTY, change_county),
  (OBSOLETE, obsolete),
];

pub fn handler_for(code: u16) -> Option<Handler> {
  DISPATCH
    .iter()
    .find(|(candidate, _)| *candidate == code)
    .map(|(_, handler)| *handler)
}

/// Apply the whole history in source order. The first failing record
/// aborts the replay: skipping it would leave the chain unrecoverable for
/// every later record referencing the same INSEE code.
pub fn replay(towns: &mut Towns, history: &[Change]) -> Result<()> {
  for change in history {
    let Some(handler) = handler_for(change.modification) else {
      continue;
    };
    handler(towns, change).map_err(|source| {
      tracing::error!(%change, error = %source, "record could not be applied");
      Error::Apply {
        change: Box::new(change.clone()),
        source: Box::new(source),
      }
    })?;
  }
  Ok(())
}

// ─── Shared helpers ──────────────────────────────────────────────────────────

fn official_name(change: &Change, current_name: &str) -> String {
  if change.new_name.is_empty() {
    current_name.to_string()
  } else {
    change.new_name.clone()
  }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// Simple rename, or the surviving side of a fusion renaming itself
/// (codes 100 and 110).
fn change_name(towns: &mut Towns, change: &Change) -> Result<()> {
  let current = towns.get_current(&change.depcom, change.effective)?.clone();

  let new_town = current.derive(TownPatch {
    id: Some(TownId::new(current.depcom(), change.effective_date)),
    start_datetime: Some(change.effective),
    end_datetime: Some(END_DATETIME),
    // NCCOFF holds the post-event name; snapshots already carry it on
    // fusions, hence the fallback to the current name.
    name: Some(official_name(change, &current.name)),
    successors: Some(Vec::new()),
    ..TownPatch::default()
  })?;
  towns.insert(new_town.clone(), None)?;

  let old = current
    .derive(TownPatch {
      name: Some(
        change
          .former_name
          .clone()
          .unwrap_or_else(|| current.name.clone()),
      ),
      end_datetime: Some(tick_before(change.effective)),
      modification: Some(vec![change.modification]),
      ..TownPatch::default()
    })?
    .with_successor(new_town.id.clone());
  // Siblings absorbed at the same instant may already point at the old
  // interval; drag them to the renamed one.
  towns.update(old, Some(&new_town))
}

/// Creation of a new interval from the currently-valid template (codes
/// 111 and 200, plus 341 through [`creation_delegated_pole`]).
fn creation(towns: &mut Towns, change: &Change) -> Result<()> {
  creation_with(towns, change, false)
}

/// Pole of a commune nouvelle (code 341): the template survives when its
/// name lives on in the new interval.
fn creation_delegated_pole(towns: &mut Towns, change: &Change) -> Result<()> {
  creation_with(towns, change, true)
}

fn creation_with(
  towns: &mut Towns,
  change: &Change,
  keep_current: bool,
) -> Result<()> {
  let current = towns.get_current(&change.depcom, change.effective)?.clone();

  let new_town = current.derive(TownPatch {
    id: Some(TownId::new(current.depcom(), change.effective_date)),
    start_datetime: Some(change.effective),
    end_datetime: Some(END_DATETIME),
    name: Some(official_name(change, &current.name)),
    modification: Some(vec![change.modification]),
    successors: Some(Vec::new()),
  })?;
  // Several records may describe the same creation from different
  // angles; only the first one materialises it. Inserting with
  // `from = current` moves stale references over to the new interval.
  if !towns.contains(&new_town.id) {
    towns.insert(new_town.clone(), Some(&current))?;
  }

  // Group membership order in the feed is not guaranteed; cleanup waits
  // for the record flagged as last.
  if change.last == Some(false) {
    return Ok(());
  }

  if new_town.id != current.id
    && (new_town.name == current.name || !keep_current)
  {
    towns.delete(&current.id);
  }
  Ok(())
}

/// A previously merged-away code becomes independent again (codes 120
/// and 210).
fn reinstatement(towns: &mut Towns, change: &Change) -> Result<()> {
  let current = towns.get_current(&change.depcom, change.effective)?.clone();

  let id = TownId::new(current.depcom(), change.effective_date);
  // A rename at the same effective date may already have produced the
  // interval; the reinstatement then has nothing to add.
  if towns.contains(&id) {
    return Ok(());
  }

  let new_town = current.derive(TownPatch {
    id: Some(id),
    start_datetime: Some(change.effective),
    end_datetime: Some(END_DATETIME),
    name: Some(change.new_name.clone()),
    successors: Some(Vec::new()),
    modification: Some(Vec::new()),
  })?;
  towns.insert(new_town.clone(), None)?;

  let old = current
    .derive(TownPatch {
      name: Some(
        change
          .former_name
          .clone()
          .unwrap_or_else(|| change.new_name.clone()),
      ),
      // The prior interval may already have been closed earlier by an
      // unrelated event; never reopen it.
      end_datetime: Some(
        current.end_datetime.min(tick_before(change.effective)),
      ),
      modification: Some(vec![change.modification]),
      ..TownPatch::default()
    })?
    .with_successor(new_town.id.clone());
  towns.update(old, None)
}

/// Split leader (code 230): only a type annotation — the split itself
/// materialises through the partners' later records.
fn spliting(towns: &mut Towns, change: &Change) -> Result<()> {
  let current = towns.get_current(&change.depcom, change.effective)?.clone();
  let tagged = current.derive(TownPatch {
    modification: Some(vec![change.modification]),
    ..TownPatch::default()
  })?;
  towns.update(tagged, None)
}

/// Absorption into another code (codes 300, 310, 330 and 331).
fn deletion(towns: &mut Towns, change: &Change) -> Result<()> {
  let current = towns.get_current(&change.depcom, change.effective)?.clone();

  // A same-day fusion + reinstatement chain yields an interval opening at
  // the event instant; push the close forward one tick instead of
  // producing an empty window.
  let end = if current.start_datetime == change.effective {
    tick_after(change.effective)
  } else {
    tick_before(change.effective)
  };

  let old = current.derive(TownPatch {
    name: Some(official_name(change, &current.name)),
    end_datetime: Some(end),
    modification: Some(vec![change.modification]),
    ..TownPatch::default()
  })?;
  // Store the closed interval before resolving the absorber: when a
  // group absorbs into its own code, the lookup must land on the new
  // pole, not on the interval just closed.
  towns.update(old.clone(), None)?;

  let successor = towns
    .get_current(
      change.related.as_deref().unwrap_or_default(),
      change.effective,
    )?
    .clone();
  let old = old.with_successor(successor.id.clone());
  towns.update(old, Some(&successor))
}

/// Commune nouvelle without delegated communes (code 311).
fn creation_not_delegated(towns: &mut Towns, change: &Change) -> Result<()> {
  let current = towns.get_current(&change.depcom, change.effective)?.clone();

  let self_related = change.related.as_deref() == Some(change.depcom.as_str());
  if self_related && current.name != change.new_name {
    // The pole keeps the code; open it under the event date and close
    // the template under its pre-merge name.
    let pole = current.derive(TownPatch {
      id: Some(TownId::new(current.depcom(), change.effective_date)),
      start_datetime: Some(change.effective),
      modification: Some(vec![CREATION_NOT_DELEGATED_POLE]),
      ..TownPatch::default()
    })?;
    towns.insert(pole.clone(), Some(&current))?;

    let old = current
      .derive(TownPatch {
        name: Some(change.new_name.clone()),
        end_datetime: Some(tick_before(change.effective)),
        modification: Some(vec![change.modification]),
        ..TownPatch::default()
      })?
      .with_successor(pole.id.clone());
    towns.update(old, None)
  } else {
    let successor = towns
      .get_current(
        change.related.as_deref().unwrap_or_default(),
        change.effective,
      )?
      .clone();
    let old = current
      .derive(TownPatch {
        end_datetime: Some(tick_before(change.effective)),
        modification: Some(vec![change.modification]),
        ..TownPatch::default()
      })?
      .with_successor(successor.id.clone());
    towns.update(old, None)
  }
}

/// Department transfer (code 410): close the chain under the former code
/// and reopen it under the new one.
fn change_county(towns: &mut Towns, change: &Change) -> Result<()> {
  let current = towns.get_current(&change.depcom, change.effective)?.clone();

  // A fusion may have closed the predecessor at this very instant
  // (Blamécourt); keep the new window at least one tick wide.
  let new_town = current.derive(TownPatch {
    id: Some(TownId::new(current.depcom(), change.effective_date)),
    start_datetime: Some(change.effective),
    end_datetime: Some(
      current.end_datetime.max(tick_after(change.effective)),
    ),
    ..TownPatch::default()
  })?;
  towns.insert(new_town.clone(), None)?;
  towns.delete(&current.id);

  // Older records carry the former code in COMECH instead of DEPANC.
  let former = change
    .former_depcom
    .as_deref()
    .or(change.related.as_deref())
    .unwrap_or_default();
  let current = towns.get_current(former, change.effective)?.clone();
  if current.valid_at(change.effective) {
    let old = current
      .derive(TownPatch {
        end_datetime: Some(tick_before(change.effective)),
        modification: Some(vec![change.modification]),
        ..TownPatch::default()
      })?
      .with_successor(new_town.id.clone());
    towns.update(old, None)
  } else {
    // The former code already moved county at another date
    // (Châteaufort): manufacture the missing original-era interval.
    // Re-keying runs through `derive`, which fixes department fields
    // stamped from the wrong county at creation time.
    let old = current
      .derive(TownPatch {
        id: Some(TownId::new(current.depcom(), START_DATE)),
        start_datetime: Some(START_DATETIME),
        end_datetime: Some(tick_before(change.effective)),
        modification: Some(vec![change.modification]),
        ..TownPatch::default()
      })?
      .with_successor(new_town.id.clone());
    towns.insert(old, None)
  }
}

/// Code retired from the registry (code 990).
fn obsolete(towns: &mut Towns, change: &Change) -> Result<()> {
  let current = towns.get_current(&change.depcom, change.effective)?.clone();
  let old = current.derive(TownPatch {
    end_datetime: Some(tick_before(change.effective)),
    modification: Some(vec![change.modification]),
    ..TownPatch::default()
  })?;
  towns.update(old, None)
}
