//! SIS scheduling events: timetabled occurrences of a course in a term.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{
  collate::Collator,
  group::LocalizedText,
  term::TermId,
};

/// Whether the event is a lecture or a lab session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
  Lecture,
  Labs,
}

/// Which weeks a fortnightly event takes place in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum WeekParity {
  Odd,
  Even,
}

/// The course an event belongs to.
///
/// SIS sends captions either as a `captions` map or as flat
/// `caption_cs`/`caption_en` fields; both are read into [`Course::captions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CourseRecord")]
pub struct Course {
  /// SIS course code, e.g. `NPRG013`. Empty when SIS did not provide one.
  pub code:     String,
  pub captions: LocalizedText,
}

/// Wire shape of [`Course`] accepting both caption layouts.
#[derive(Deserialize)]
struct CourseRecord {
  #[serde(default)]
  code:       String,
  #[serde(default)]
  captions:   LocalizedText,
  #[serde(default)]
  caption_cs: Option<String>,
  #[serde(default)]
  caption_en: Option<String>,
}

impl From<CourseRecord> for Course {
  fn from(record: CourseRecord) -> Self {
    let mut captions = record.captions;
    for (locale, text) in [("cs", record.caption_cs), ("en", record.caption_en)] {
      if let Some(text) = text
        && captions.get(locale).is_none()
      {
        captions = captions.with(locale, text);
      }
    }
    Self { code: record.code, captions }
  }
}

/// A scheduling event. Every field except `sis_id` may be missing in SIS data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingEvent {
  #[serde(default)]
  pub id:          String,
  pub sis_id:      String,
  #[serde(default)]
  pub course:      Course,
  #[serde(default)]
  pub year:        Option<i32>,
  #[serde(default)]
  pub term:        Option<u8>,
  #[serde(default, rename = "type")]
  pub kind:        Option<EventKind>,
  /// 0 = Sunday … 6 = Saturday.
  #[serde(default)]
  pub day_of_week: Option<u8>,
  /// Minutes from midnight; `None` means not scheduled.
  #[serde(default)]
  pub time:        Option<u32>,
  #[serde(default)]
  pub room:        Option<String>,
  #[serde(default)]
  pub fortnight:   bool,
  #[serde(default)]
  pub first_week:  i32,
}

impl SchedulingEvent {
  /// The `(year, term)` of the event when both are present and non-zero.
  pub fn term_id(&self) -> Option<TermId> {
    match (self.year, self.term) {
      (Some(year), Some(term)) if year != 0 && term != 0 => {
        Some(TermId::new(year, term))
      }
      _ => None,
    }
  }

  /// The course code when non-empty.
  pub fn course_code(&self) -> Option<&str> {
    Some(self.course.code.as_str()).filter(|c| !c.is_empty())
  }

  /// Localized course caption with the usual fallbacks.
  pub fn course_name(&self, locale: &str) -> &str {
    self.course.captions.resolve(locale)
  }

  pub fn is_scheduled(&self) -> bool {
    self.day_of_week.is_some() || self.time.is_some()
  }

  /// Start time as `H:MM`.
  pub fn time_label(&self) -> Option<String> {
    self.time.map(minutes_to_time)
  }

  /// Odd/even week label; only meaningful for fortnightly events.
  pub fn week_parity(&self) -> Option<WeekParity> {
    if !self.fortnight {
      return None;
    }
    Some(if self.first_week.rem_euclid(2) == 1 {
      WeekParity::Odd
    } else {
      WeekParity::Even
    })
  }
}

/// Format minutes from midnight as `H:MM`.
pub fn minutes_to_time(minutes: u32) -> String {
  format!("{}:{:02}", minutes / 60, minutes % 60)
}

/// Events sorted by their localized course name, ties by SIS id.
pub fn sorted_events<'a>(
  events: &'a [SchedulingEvent],
  locale: &str,
) -> Vec<&'a SchedulingEvent> {
  let collator = Collator::for_locale(locale);
  let mut sorted: Vec<&SchedulingEvent> = events.iter().collect();
  sorted.sort_by(|a, b| {
    collator
      .compare(a.course_name(locale), b.course_name(locale))
      .then_with(|| a.sis_id.cmp(&b.sis_id))
  });
  sorted
}
