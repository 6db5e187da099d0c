//! Workflow modes and the legal transitions between them.
//!
//! At most one non-default mode is active at a time; every mode returns to
//! [`Mode::Default`] on cancel or completion.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{Result, WorkflowError};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Mode {
  #[default]
  Default,
  AddingAttribute,
  PlantingConfigure,
  PlantingConfirm,
  Archiving,
}

impl Mode {
  /// Modes that carry a group selection.
  pub fn has_selection(self) -> bool {
    matches!(self, Self::PlantingConfigure | Self::PlantingConfirm | Self::Archiving)
  }
}

pub fn allowed_transitions(from: Mode) -> &'static [Mode] {
  use Mode::*;
  match from {
    Default => &[AddingAttribute, PlantingConfigure, Archiving],
    AddingAttribute => &[Default],
    PlantingConfigure => &[PlantingConfirm, Default],
    PlantingConfirm => &[Default],
    Archiving => &[Default],
  }
}

pub fn validate_transition(from: Mode, to: Mode) -> Result<()> {
  if allowed_transitions(from).contains(&to) {
    Ok(())
  } else {
    Err(WorkflowError::IllegalTransition { from, to })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_default_enters_other_modes() {
    assert!(validate_transition(Mode::Default, Mode::Archiving).is_ok());
    assert!(validate_transition(Mode::Archiving, Mode::PlantingConfigure).is_err());
    assert!(validate_transition(Mode::AddingAttribute, Mode::Archiving).is_err());
  }

  #[test]
  fn planting_must_configure_before_confirm() {
    assert!(validate_transition(Mode::Default, Mode::PlantingConfirm).is_err());
    assert!(validate_transition(Mode::PlantingConfigure, Mode::PlantingConfirm).is_ok());
  }

  #[test]
  fn every_mode_can_return_to_default() {
    for mode in [
      Mode::AddingAttribute,
      Mode::PlantingConfigure,
      Mode::PlantingConfirm,
      Mode::Archiving,
    ] {
      assert!(validate_transition(mode, Mode::Default).is_ok(), "{mode}");
    }
  }
}
