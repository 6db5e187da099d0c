//! Synchronous input validation, run before any remote call.
//!
//! Failures are reported per form field so a presentation layer can attach
//! them to the offending input.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{
  group::{AttributeKey, Group},
  term::{Season, TermId},
};

static COURSE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[A-Z0-9]{3,9}$").expect("valid regex"));
static TERM: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^20[0-9]{2}-[12]$").expect("valid regex"));
static SIS_GROUP: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]{8,16}$").expect("valid regex"));
static CUSTOM_KEY: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[-_a-zA-Z0-9]+$").expect("valid regex"));

/// Longest accepted plant text.
pub const MAX_TEXT_LEN: usize = 255;

// ─── Field errors ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FieldErrorKind {
  Required,
  Malformed,
  TooLong,
  /// The attribute is already present on the group.
  Duplicate,
}

/// A validation failure attached to one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{field}: {kind}")]
pub struct FieldError {
  /// Form field name, e.g. `course`, `key`, `value`, `cs.name`.
  pub field: String,
  pub kind:  FieldErrorKind,
}

impl FieldError {
  pub fn new(field: impl Into<String>, kind: FieldErrorKind) -> Self {
    Self { field: field.into(), kind }
  }
}

// ─── Attributes ──────────────────────────────────────────────────────────────

/// Validate a new `(key, value)` attribute for `group`.
///
/// Well-known keys report errors under their own name; custom keys report
/// under `key` or `value`. The duplicate check only runs once the pair is
/// well-formed.
pub fn validate_attribute(
  group: &Group,
  key: &AttributeKey,
  value: &str,
) -> Result<(), FieldError> {
  let (field, pattern) = match key {
    AttributeKey::Course => ("course", &*COURSE),
    AttributeKey::Term => ("term", &*TERM),
    AttributeKey::Group => ("group", &*SIS_GROUP),
    AttributeKey::Custom(name) => {
      if name.is_empty() {
        return Err(FieldError::new("key", FieldErrorKind::Required));
      }
      if !CUSTOM_KEY.is_match(name) {
        return Err(FieldError::new("key", FieldErrorKind::Malformed));
      }
      if value.trim().is_empty() {
        return Err(FieldError::new("value", FieldErrorKind::Required));
      }
      if group.attributes.contains(key, value) {
        return Err(FieldError::new("value", FieldErrorKind::Duplicate));
      }
      return Ok(());
    }
  };

  if value.is_empty() {
    return Err(FieldError::new(field, FieldErrorKind::Required));
  }
  if !pattern.is_match(value) {
    return Err(FieldError::new(field, FieldErrorKind::Malformed));
  }
  if group.attributes.contains(key, value) {
    return Err(FieldError::new(field, FieldErrorKind::Duplicate));
  }
  Ok(())
}

// ─── Plant texts ─────────────────────────────────────────────────────────────

/// Name and description of a newly planted group in one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupText {
  pub name:        String,
  pub description: String,
}

/// Localized texts for the groups created by a planting batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantTexts {
  pub cs: GroupText,
  pub en: GroupText,
}

impl PlantTexts {
  /// Prefilled texts for `term`, e.g. `2024/25 1-ZS` / `Zimní semestr 2024/25`.
  pub fn defaults_for(term: TermId) -> Self {
    let year = term.academic_year();
    let (cs_label, cs_name, en_label, en_name) = match term.season() {
      Some(Season::Summer) => ("LS", "Letní semestr", "Summer", "Summer term"),
      _ => ("ZS", "Zimní semestr", "Winter", "Winter term"),
    };
    Self {
      cs: GroupText {
        name:        format!("{year} 1-{cs_label}"),
        description: format!("{cs_name} {year}"),
      },
      en: GroupText {
        name:        format!("{year} 1-{en_label}"),
        description: format!("{en_name} {year}"),
      },
    }
  }

  /// Every text must be non-empty after trimming and at most
  /// [`MAX_TEXT_LEN`] characters. Reports every failing field.
  pub fn validate(&self) -> Result<(), Vec<FieldError>> {
    let fields = [
      ("cs.name", &self.cs.name),
      ("cs.description", &self.cs.description),
      ("en.name", &self.en.name),
      ("en.description", &self.en.description),
    ];
    let errors: Vec<FieldError> = fields
      .into_iter()
      .filter_map(|(field, text)| {
        if text.trim().is_empty() {
          Some(FieldError::new(field, FieldErrorKind::Required))
        } else if text.chars().count() > MAX_TEXT_LEN {
          Some(FieldError::new(field, FieldErrorKind::TooLong))
        } else {
          None
        }
      })
      .collect();
    if errors.is_empty() { Ok(()) } else { Err(errors) }
  }
}
