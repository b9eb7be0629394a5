//! Change records — the events driving timeline transitions.
//!
//! One [`Change`] per row of the registry's modification history. The
//! `modification` code classifies the administrative event per the INSEE
//! COG nomenclature; codes without a dispatch handler flow through the
//! replay untouched.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ─── COG modification codes ──────────────────────────────────────────────────
// https://www.insee.fr/fr/information/2114773 — the registry defines ~30
// codes; the ones without a named constant here are never acted upon.

pub const CHANGE_NAME: u16 = 100;
pub const CHANGE_NAME_FUSION: u16 = 110;
pub const CHANGE_NAME_CREATION: u16 = 111;
pub const CHANGE_NAME_REINSTATEMENT: u16 = 120;
/// Renames following a chief-place transfer; not acted upon.
pub const CHANGE_NAME_CHIEF_PLACE: u16 = 130;
pub const CREATION: u16 = 200;
pub const REINSTATEMENT: u16 = 210;
/// Commune ceding parcels at a creation; not acted upon.
pub const GAVE_PARCELS: u16 = 220;
pub const SPLITING: u16 = 230;
/// Commune born from a partition; the partner records carry the action.
pub const CREATED_FROM_PARTITION: u16 = 240;
pub const DELETION_PARTITION: u16 = 300;
pub const DELETION_FUSION: u16 = 310;
pub const CREATION_NOT_DELEGATED: u16 = 311;
/// Absorbing side of a fusion; driven entirely by its partner records.
pub const FUSION_ABSORPTION: u16 = 320;
/// Written as an interval tag by the 311 handler, never dispatched.
pub const CREATION_NOT_DELEGATED_POLE: u16 = 321;
pub const FUSION_ASSOCIATION_ASSOCIATED: u16 = 330;
pub const CREATION_DELEGATED: u16 = 331;
/// Pre-existing delegated commune inside a commune nouvelle; not acted
/// upon.
pub const CREATION_PREEXISTING_DELEGATED: u16 = 332;
/// Absorbing side of a fusion-association; not acted upon.
pub const FUSION_ASSOCIATION_ABSORBER: u16 = 340;
pub const CREATION_DELEGATED_POLE: u16 = 341;
/// Fusions forming a brand-new commune; not acted upon.
pub const FUSION_TO_NEW_FOLLOWER: u16 = 350;
pub const FUSION_TO_NEW_LEADER: u16 = 360;
pub const CHANGE_COUNTY: u16 = 410;
pub const OBSOLETE: u16 = 990;

// ─── Change ──────────────────────────────────────────────────────────────────

/// One modification record from the history feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
  /// INSEE code of the affected town.
  pub depcom:        String,
  /// Raw COG modification code.
  pub modification:  u16,
  /// Effective instant — midnight of `effective_date`.
  pub effective:     NaiveDateTime,
  pub effective_date: NaiveDate,
  /// Official name after the event (NCCOFF).
  pub new_name:      String,
  /// Name before the event (NCCANC), when the feed provides it.
  pub former_name:   Option<String>,
  /// Related INSEE code (COMECH): merge partner, successor or pole.
  pub related:       Option<String>,
  /// Prior INSEE code before a county change (DEPANC).
  pub former_depcom: Option<String>,
  pub dep:           String,
  pub com:           String,
  /// For grouped multi-record actions: whether this record closes its
  /// group. `None` for ungrouped records — the cleanup-deferral rule must
  /// not fire for them.
  pub last:          Option<bool>,
}

impl fmt::Display for Change {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "change {} on {} effective {} ({:?} -> {:?})",
      self.modification,
      self.depcom,
      self.effective_date,
      self.former_name.as_deref().unwrap_or(""),
      self.new_name,
    )
  }
}
