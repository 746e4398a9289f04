//! Error types for the onboarding wizard engine.

use crate::wizard::step::WizardStep;

/// Top-level error type for the wizard.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Flow-control errors raised by the wizard controller itself.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Wizard is already in the terminal state")]
    TerminalState,

    #[error("A blocking operation ({operation}) is already in flight")]
    Busy { operation: &'static str },

    #[error("Operation {operation} was cancelled by navigation")]
    Cancelled { operation: &'static str },

    #[error("Identity method is locked once details are fetched; re-consent required")]
    IdentityLocked,

    #[error("A KYC method must be selected first")]
    NoKycMethodSelected,

    #[error("Consent must be granted before identity details are fetched")]
    ConsentRequired,

    #[error("Contribution {amount} is below the minimum of {minimum}")]
    ContributionTooLow { amount: u64, minimum: u64 },

    #[error("Operation {operation} requires the {expected} step (currently {actual})")]
    WrongStep {
        operation: &'static str,
        expected: WizardStep,
        actual: WizardStep,
    },
}

/// Errors from the backend collaborator.
///
/// `InvalidResumeToken` is deliberately its own variant: the UI surfaces it
/// distinctly from transient failures, and no local state changes on it.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Document scan failed: {reason}")]
    ScanFailed { reason: String },

    #[error("Account identifier issuance failed: {reason}")]
    IssuanceFailed { reason: String },

    #[error("Invalid or expired resume token")]
    InvalidResumeToken,

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Local snapshot-store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Snapshot version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },
}

/// Result type alias for the wizard.
pub type Result<T> = std::result::Result<T, Error>;
