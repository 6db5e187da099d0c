//! Academic terms and their visibility windows.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{Error, Result};

// ─── Term identifier ─────────────────────────────────────────────────────────

/// Half of the academic year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Season {
  Winter,
  Summer,
}

/// A `(year, term)` pair; `term` is 1 for winter and 2 for summer.
///
/// Its string form (`"2024-1"`) is the value stored under the `term` group
/// attribute.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TermId {
  pub year: i32,
  pub term: u8,
}

impl TermId {
  pub fn new(year: i32, term: u8) -> Self { Self { year, term } }

  pub fn season(&self) -> Option<Season> {
    match self.term {
      1 => Some(Season::Winter),
      2 => Some(Season::Summer),
      _ => None,
    }
  }

  /// The academic-year label, e.g. `2024/25`.
  pub fn academic_year(&self) -> String {
    format!("{}/{:02}", self.year, (self.year + 1).rem_euclid(100))
  }
}

impl fmt::Display for TermId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.year, self.term)
  }
}

impl FromStr for TermId {
  type Err = Error;

  /// Accepts exactly `YYYY-T` with `T` being `1` or `2`.
  fn from_str(s: &str) -> Result<Self> {
    let invalid = || Error::InvalidTermId(s.to_owned());
    let (year, term) = s.split_once('-').ok_or_else(invalid)?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
      return Err(invalid());
    }
    let term = match term {
      "1" => 1,
      "2" => 2,
      _ => return Err(invalid()),
    };
    Ok(Self::new(year.parse().map_err(|_| invalid())?, term))
  }
}

// ─── Term ────────────────────────────────────────────────────────────────────

/// A term record. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
  pub year:           i32,
  pub term:           u8,
  pub students_from:  i64,
  pub students_until: i64,
  pub teachers_from:  i64,
  pub teachers_until: i64,
  /// Term groups become archivable once this moment has passed.
  #[serde(default)]
  pub archive_after:  Option<i64>,
}

impl Term {
  pub fn id(&self) -> TermId { TermId::new(self.year, self.term) }

  pub fn visible_to_students(&self, now: i64) -> bool {
    self.students_from <= now && now <= self.students_until
  }

  pub fn visible_to_teachers(&self, now: i64) -> bool {
    self.teachers_from <= now && now <= self.teachers_until
  }

  pub fn is_archivable(&self, now: i64) -> bool {
    self.archive_after.is_some_and(|after| after <= now)
  }
}

/// Terms currently open to teachers, newest first.
pub fn active_for_teachers(terms: &[Term], now: i64) -> Vec<&Term> {
  let mut active: Vec<&Term> =
    terms.iter().filter(|t| t.visible_to_teachers(now)).collect();
  active.sort_by(|a, b| b.id().cmp(&a.id()));
  active
}
