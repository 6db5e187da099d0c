//! Locale-aware string ordering for group and course names.
//!
//! Strings are compared in three levels: base letters (case and accents
//! folded), then accents, then case. A final code-point comparison makes the
//! order total. Czech additionally treats `ch` and the háček letters
//! `č ř š ž` as letters of their own.

use std::cmp::Ordering;

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

const CARON: char = '\u{030C}';

/// One base character with its folded case and trailing combining marks.
struct Glyph {
  base:  char,
  upper: bool,
  marks: Vec<char>,
}

/// A collation element: primary (letter), secondary (accent), tertiary (case).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Element {
  primary:   u32,
  secondary: u32,
  tertiary:  u8,
}

/// Compares strings according to the rules of one locale.
#[derive(Debug, Clone, Copy)]
pub struct Collator {
  czech: bool,
}

impl Collator {
  /// Collator for a locale code such as `en`, `cs`, or `cs-CZ`.
  pub fn for_locale(locale: &str) -> Self {
    let language = locale.split(['-', '_']).next().unwrap_or_default();
    Self { czech: language.eq_ignore_ascii_case("cs") }
  }

  pub fn compare(&self, a: &str, b: &str) -> Ordering {
    let ka = self.elements(a);
    let kb = self.elements(b);

    let level = |f: fn(&Element) -> u32| {
      ka.iter().map(f).cmp(kb.iter().map(f))
    };

    level(|e| e.primary)
      .then_with(|| level(|e| e.secondary))
      .then_with(|| level(|e| u32::from(e.tertiary)))
      .then_with(|| a.cmp(b))
  }

  fn elements(&self, s: &str) -> Vec<Element> {
    let glyphs = glyphs(s);
    let mut out = Vec::with_capacity(glyphs.len());
    let mut i = 0;

    while i < glyphs.len() {
      let glyph = &glyphs[i];
      let tertiary = u8::from(glyph.upper);

      if self.czech
        && glyph.base == 'c'
        && glyph.marks.is_empty()
        && glyphs.get(i + 1).is_some_and(|n| n.base == 'h' && n.marks.is_empty())
      {
        out.push(Element { primary: weight('h') + 1, secondary: 0, tertiary });
        i += 2;
        continue;
      }

      let mut primary = weight(glyph.base);
      let mut marks = glyph.marks.as_slice();
      if self.czech
        && matches!(glyph.base, 'c' | 'r' | 's' | 'z')
        && marks.first() == Some(&CARON)
      {
        primary += 1;
        marks = &marks[1..];
      }
      let secondary = marks.iter().fold(0u32, |acc, &m| acc.wrapping_mul(31).wrapping_add(m as u32));

      out.push(Element { primary, secondary, tertiary });
      i += 1;
    }
    out
  }
}

/// Primary weights leave a gap after every code point for locale-specific
/// letters sorted directly after their base.
fn weight(c: char) -> u32 { (c as u32) * 4 }

fn glyphs(s: &str) -> Vec<Glyph> {
  let mut out: Vec<Glyph> = Vec::new();
  for c in s.nfd() {
    if is_combining_mark(c) {
      if let Some(last) = out.last_mut() {
        last.marks.push(c);
      }
      continue;
    }
    let lower = c.to_lowercase().next().unwrap_or(c);
    out.push(Glyph { base: lower, upper: lower != c, marks: Vec::new() });
  }
  out
}
