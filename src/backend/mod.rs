//! Backend collaborator interface.
//!
//! Everything the wizard needs from the outside world goes through
//! [`OnboardingBackend`]. Calls fall into two contract-level classes:
//!
//! - **best-effort side channel** (session start, consent archival,
//!   risk-signal updates, notifications): spawned detached via
//!   [`spawn_best_effort`], failures logged and swallowed, local state never
//!   rolled back;
//! - **blocking** (document scan, account issuance, resume lookup): awaited
//!   by the controller with a busy indicator, at most one in flight.

pub mod http;
pub mod stub;

pub use http::HttpBackend;
pub use stub::StubBackend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::BackendError;
use crate::risk::RiskSignal;
use crate::wizard::model::{AccountType, IdentityFields, KycMethod};

/// Identifiers returned when a session is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub session_id: String,
    pub resume_token: String,
}

/// Previously collected data returned by a resume lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumedProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_type: Option<AccountType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A recovered session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumedSession {
    pub session_id: String,
    pub profile: ResumedProfile,
}

/// Result of a document scan: extracted identity plus the server risk signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub fields: IdentityFields,
    #[serde(flatten)]
    pub risk: RiskSignal,
}

/// The issued account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PranIssuance {
    pub pran: String,
    pub issued_at: DateTime<Utc>,
}

/// Partial profile fields pushed to the backend as answers change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_resident: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pep: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contribution_amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kyc_method: Option<KycMethod>,
}

/// Notification delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    WhatsApp,
    Sms,
}

/// Async interface to the onboarding backend.
#[async_trait]
pub trait OnboardingBackend: Send + Sync {
    /// Open a new session. Called fire-and-forget on the Gate→Identity
    /// transition; its failure never blocks the UI.
    async fn start_session(
        &self,
        language: &str,
        account_type: AccountType,
    ) -> Result<SessionHandle, BackendError>;

    /// Look up a saved session by its opaque resume token.
    async fn resume_session(&self, resume_token: &str) -> Result<ResumedSession, BackendError>;

    /// OCR-scan an identity document. Blocking class; retryable on failure.
    async fn scan_document(&self, file: Vec<u8>) -> Result<ScanOutcome, BackendError>;

    /// Issue the final account identifier. Blocking class; the terminal state
    /// is entered only on success.
    async fn issue_pran(&self) -> Result<PranIssuance, BackendError>;

    /// Push changed profile fields; returns the refreshed risk signal.
    async fn update_profile(&self, update: ProfileUpdate) -> Result<RiskSignal, BackendError>;

    /// Archive a consent artifact. Best-effort.
    async fn archive_consent(
        &self,
        consent_type: &str,
        consent_text: &str,
        metadata: serde_json::Value,
    ) -> Result<(), BackendError>;

    /// Send a notification. Best-effort.
    async fn send_notification(
        &self,
        channel: NotificationChannel,
        recipient: &str,
        message: &str,
    ) -> Result<(), BackendError>;

    /// Ask the assistant backend a question.
    async fn chat(&self, query: &str) -> Result<String, BackendError>;
}

/// Spawn a best-effort side-channel task.
///
/// The distinction from required work is enforced here by contract: the
/// future's error is logged at warn and dropped, never surfaced.
pub fn spawn_best_effort<F, E>(what: &'static str, fut: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = Result<(), E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            tracing::warn!("{what} failed (best-effort, ignored): {e}");
        }
    })
}
