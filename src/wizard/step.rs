//! Wizard step state machine — tracks which screen the user is on.

use serde::{Deserialize, Serialize};

/// The steps of the onboarding wizard.
///
/// Progresses linearly: Gate → Identity → Profile → Investment →
/// Confirmation → Success. Success is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Gate,
    Identity,
    Profile,
    Investment,
    Confirmation,
    Success,
}

impl WizardStep {
    /// Zero-based index of the step (Gate = 0 … Success = 5).
    pub fn index(&self) -> u8 {
        match self {
            Self::Gate => 0,
            Self::Identity => 1,
            Self::Profile => 2,
            Self::Investment => 3,
            Self::Confirmation => 4,
            Self::Success => 5,
        }
    }

    /// Step for a stored index, if valid.
    pub fn from_index(index: u8) -> Option<WizardStep> {
        use WizardStep::*;
        match index {
            0 => Some(Gate),
            1 => Some(Identity),
            2 => Some(Profile),
            3 => Some(Investment),
            4 => Some(Confirmation),
            5 => Some(Success),
            _ => None,
        }
    }

    /// Check if a transition from `self` to `target` is valid (forward only,
    /// one step at a time — skipping is never permitted).
    pub fn can_transition_to(&self, target: WizardStep) -> bool {
        self.next() == Some(target)
    }

    /// Whether this step is terminal (the wizard is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Get the next step in the linear progression, if any.
    pub fn next(&self) -> Option<WizardStep> {
        use WizardStep::*;
        match self {
            Gate => Some(Identity),
            Identity => Some(Profile),
            Profile => Some(Investment),
            Investment => Some(Confirmation),
            Confirmation => Some(Success),
            Success => None,
        }
    }

    /// Get the previous step, if any. Retreat is always allowed and never
    /// discards answers.
    pub fn prev(&self) -> Option<WizardStep> {
        use WizardStep::*;
        match self {
            Gate => None,
            Identity => Some(Gate),
            Profile => Some(Identity),
            Investment => Some(Profile),
            Confirmation => Some(Investment),
            Success => Some(Confirmation),
        }
    }

    /// Progress percentage shown to the user.
    ///
    /// The gate contributes 0%; content steps are `round(step / total × 100)`.
    pub fn progress_percent(&self, total_steps: u8) -> u8 {
        match self {
            Self::Gate => 0,
            Self::Success => 100,
            _ => {
                let pct = f64::from(self.index()) / f64::from(total_steps) * 100.0;
                pct.round() as u8
            }
        }
    }
}

impl Default for WizardStep {
    fn default() -> Self {
        Self::Gate
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Gate => "gate",
            Self::Identity => "identity",
            Self::Profile => "profile",
            Self::Investment => "investment",
            Self::Confirmation => "confirmation",
            Self::Success => "success",
        };
        write!(f, "{s}")
    }
}
