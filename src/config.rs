//! Configuration types.

/// Wizard configuration.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Total session time budget, in seconds.
    pub session_budget_secs: u32,
    /// Remaining seconds at which the timer enters the warning urgency.
    pub warning_threshold_secs: u32,
    /// Remaining seconds at which the timer enters the danger urgency.
    pub danger_threshold_secs: u32,
    /// Minimum initial contribution, in whole rupees.
    pub min_contribution: u64,
    /// Number of content steps used for progress percentage (gate excluded).
    pub total_steps: u8,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            session_budget_secs: 600, // 10 minutes
            warning_threshold_secs: 180,
            danger_threshold_secs: 60,
            min_contribution: 500,
            total_steps: 4,
        }
    }
}
