//! Group records as delivered by the backend.
//!
//! A [`Group`] is a raw, flat record that references its parent by id. Every
//! derived value (full name, inherited admin flag, children) is computed in
//! [`crate::tree`]; nothing here is ever mutated after a fetch, except the
//! transient [`Group::pending`] marker on local copies.

use std::{borrow::Borrow, collections::BTreeMap, fmt};

use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Opaque group identifier assigned by the backend.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for GroupId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl Borrow<str> for GroupId {
  fn borrow(&self) -> &str { &self.0 }
}

impl From<&str> for GroupId {
  fn from(value: &str) -> Self { Self(value.to_owned()) }
}

impl From<String> for GroupId {
  fn from(value: String) -> Self { Self(value) }
}

// ─── Membership ──────────────────────────────────────────────────────────────

/// The acting user's relation to a group.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Membership {
  #[default]
  None,
  Student,
  Observer,
  Supervisor,
  Admin,
}

/// The backend sends `null` for "no membership".
fn membership_or_none<'de, D>(deserializer: D) -> Result<Membership, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(Option::<Membership>::deserialize(deserializer)?.unwrap_or_default())
}

// ─── Localized text ──────────────────────────────────────────────────────────

/// Placeholder shown when no translation is available at all.
pub const MISSING_TEXT: &str = "???";

/// A mapping from locale code to text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(BTreeMap<String, String>);

impl LocalizedText {
  pub fn new() -> Self { Self::default() }

  /// Builder-style insert.
  pub fn with(mut self, locale: &str, text: impl Into<String>) -> Self {
    self.0.insert(locale.to_owned(), text.into());
    self
  }

  pub fn get(&self, locale: &str) -> Option<&str> {
    self.0.get(locale).map(String::as_str).filter(|s| !s.is_empty())
  }

  /// Text in `locale`, falling back to English, then Czech, then
  /// [`MISSING_TEXT`].
  pub fn resolve(&self, locale: &str) -> &str {
    self
      .get(locale)
      .or_else(|| self.get("en"))
      .or_else(|| self.get("cs"))
      .unwrap_or(MISSING_TEXT)
  }
}

// ─── Attributes ──────────────────────────────────────────────────────────────

/// Key of a group attribute. The three well-known keys drive eligibility
/// rules; any other key is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttributeKey {
  /// Course code, e.g. `NPRG013`.
  Course,
  /// Term key in the `YYYY-T` form.
  Term,
  /// SIS id of a scheduling event the group is bound to.
  Group,
  Custom(String),
}

impl AttributeKey {
  pub fn as_str(&self) -> &str {
    match self {
      Self::Course => "course",
      Self::Term => "term",
      Self::Group => "group",
      Self::Custom(key) => key,
    }
  }
}

impl From<&str> for AttributeKey {
  fn from(value: &str) -> Self {
    match value {
      "course" => Self::Course,
      "term" => Self::Term,
      "group" => Self::Group,
      other => Self::Custom(other.to_owned()),
    }
  }
}

impl From<String> for AttributeKey {
  fn from(value: String) -> Self {
    match value.as_str() {
      "course" | "term" | "group" => Self::from(value.as_str()),
      _ => Self::Custom(value),
    }
  }
}

impl From<AttributeKey> for String {
  fn from(value: AttributeKey) -> Self {
    match value {
      AttributeKey::Custom(key) => key,
      known => known.as_str().to_owned(),
    }
  }
}

impl fmt::Display for AttributeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Insertion-ordered set of unique attribute values.
///
/// Duplicates in an incoming payload collapse onto their first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct AttributeValues(Vec<String>);

impl AttributeValues {
  pub fn new() -> Self { Self::default() }

  /// Append `value` unless already present. Returns whether it was added.
  pub fn insert(&mut self, value: impl Into<String>) -> bool {
    let value = value.into();
    if self.contains(&value) {
      return false;
    }
    self.0.push(value);
    true
  }

  /// Remove `value` if present. Returns whether it was removed.
  pub fn remove(&mut self, value: &str) -> bool {
    let before = self.0.len();
    self.0.retain(|v| v != value);
    self.0.len() != before
  }

  pub fn contains(&self, value: &str) -> bool {
    self.0.iter().any(|v| v == value)
  }

  pub fn as_slice(&self) -> &[String] { &self.0 }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> std::slice::Iter<'_, String> { self.0.iter() }
}

impl From<Vec<String>> for AttributeValues {
  fn from(values: Vec<String>) -> Self {
    let mut set = Self::new();
    for value in values {
      set.insert(value);
    }
    set
  }
}

impl From<AttributeValues> for Vec<String> {
  fn from(values: AttributeValues) -> Self { values.0 }
}

impl<S: Into<String>> FromIterator<S> for AttributeValues {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    let mut set = Self::new();
    for value in iter {
      set.insert(value);
    }
    set
  }
}

impl<'a> IntoIterator for &'a AttributeValues {
  type Item = &'a String;
  type IntoIter = std::slice::Iter<'a, String>;

  fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

/// The attribute bag of a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<AttributeKey, AttributeValues>);

impl Attributes {
  pub fn new() -> Self { Self::default() }

  /// Builder-style insert of a single value.
  pub fn with(mut self, key: AttributeKey, value: impl Into<String>) -> Self {
    self.insert(key, value);
    self
  }

  /// All values stored under `key`; empty when the key is absent.
  pub fn values(&self, key: &AttributeKey) -> &[String] {
    self.0.get(key).map_or(&[], AttributeValues::as_slice)
  }

  pub fn contains(&self, key: &AttributeKey, value: &str) -> bool {
    self.0.get(key).is_some_and(|values| values.contains(value))
  }

  pub fn insert(&mut self, key: AttributeKey, value: impl Into<String>) -> bool {
    self.0.entry(key).or_default().insert(value)
  }

  /// Remove a value; drops the key once its last value is gone.
  pub fn remove(&mut self, key: &AttributeKey, value: &str) -> bool {
    let Some(values) = self.0.get_mut(key) else {
      return false;
    };
    let removed = values.remove(value);
    if values.is_empty() {
      self.0.remove(key);
    }
    removed
  }

  pub fn keys(&self) -> impl Iterator<Item = &AttributeKey> { self.0.keys() }

  pub fn iter(&self) -> impl Iterator<Item = (&AttributeKey, &AttributeValues)> {
    self.0.iter()
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

// ─── Group ───────────────────────────────────────────────────────────────────

/// Marker for a mutation that is in flight for a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PendingOperation {
  Planting,
  Archiving,
  AddingAttribute,
  RemovingAttribute,
  Binding,
  Unbinding,
  Joining,
}

/// A raw group record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
  pub id:             GroupId,
  /// `None` for a root group.
  #[serde(default, rename = "parentGroupId")]
  pub parent_id:      Option<GroupId>,
  #[serde(default)]
  pub name:           LocalizedText,
  #[serde(default, deserialize_with = "membership_or_none")]
  pub membership:     Membership,
  #[serde(default)]
  pub organizational: bool,
  #[serde(default)]
  pub exam:           bool,
  #[serde(default)]
  pub archived:       bool,
  #[serde(default)]
  pub attributes:     Attributes,
  /// Transient; only ever set on local copies.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pending:        Option<PendingOperation>,
}

impl Group {
  /// A bare group with no name, membership, or attributes.
  pub fn new(id: impl Into<GroupId>, parent_id: Option<GroupId>) -> Self {
    Self {
      id: id.into(),
      parent_id,
      name: LocalizedText::default(),
      membership: Membership::None,
      organizational: false,
      exam: false,
      archived: false,
      attributes: Attributes::default(),
      pending: None,
    }
  }

  pub fn is_root(&self) -> bool { self.parent_id.is_none() }

  /// Shorthand for `self.attributes.values(key)`.
  pub fn attribute_values(&self, key: &AttributeKey) -> &[String] {
    self.attributes.values(key)
  }
}
