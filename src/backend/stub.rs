//! In-process backend stub.
//!
//! Simulates the onboarding service for demos and tests: deterministic scan
//! extraction, server-side risk scoring over the pushed profile answers, and
//! a generated account identifier. Keeps issued resume tokens so the resume
//! flow can be exercised end to end without a network.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::BackendError;
use crate::risk::{RiskSignal, RiskTier};
use crate::wizard::model::{AccountType, IdentityFields, KycMethod};

use super::{
    NotificationChannel, OnboardingBackend, PranIssuance, ProfileUpdate, ResumedProfile,
    ResumedSession, ScanOutcome, SessionHandle,
};

/// Saved state for one stub session.
#[derive(Debug, Clone)]
struct StubSession {
    session_id: String,
    account_type: AccountType,
    language: String,
}

/// Deterministic in-process backend.
#[derive(Default)]
pub struct StubBackend {
    sessions: Mutex<HashMap<String, StubSession>>,
    profile: Mutex<ProfileUpdate>,
    /// When set, blocking calls fail (for exercising retry paths).
    fail_blocking: std::sync::atomic::AtomicBool,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make scan/issuance/resume calls fail until cleared.
    pub fn set_fail_blocking(&self, fail: bool) {
        self.fail_blocking
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    fn blocking_should_fail(&self) -> bool {
        self.fail_blocking.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Server-side scoring over everything pushed so far. Mirrors the real
    /// risk engine's first rules; the client never re-implements these.
    fn score(profile: &ProfileUpdate) -> RiskSignal {
        let mut tier = RiskTier::Standard;
        let mut reasons = Vec::new();

        if profile.pep == Some(true) {
            tier = RiskTier::High;
            reasons.push("PEP Detected".to_string());
        }
        if profile.tax_resident == Some(true) {
            tier = RiskTier::High;
            reasons.push("Foreign Tax Resident".to_string());
        }
        if profile.kyc_method == Some(KycMethod::ManualUpload) {
            if tier == RiskTier::Standard {
                tier = RiskTier::Medium;
            }
            reasons.push("Manual Document Upload".to_string());
        }
        if profile.contribution_amount.is_some_and(|amt| amt > 1_000_000) {
            if tier == RiskTier::Standard {
                tier = RiskTier::Medium;
            }
            reasons.push("High-Value Transaction".to_string());
        }

        RiskSignal { tier, reasons }
    }

    /// A 12-digit identifier in the issued format: `11xx xxxx xxxx`.
    fn generate_pran() -> String {
        let mut rng = rand::thread_rng();
        let seg1 = 1100 + rng.gen_range(0..100);
        let seg2 = 1000 + rng.gen_range(0..9000);
        let seg3 = 1000 + rng.gen_range(0..9000);
        format!("{seg1} {seg2} {seg3}")
    }
}

#[async_trait]
impl OnboardingBackend for StubBackend {
    async fn start_session(
        &self,
        language: &str,
        account_type: AccountType,
    ) -> Result<SessionHandle, BackendError> {
        let session_id = Uuid::new_v4().to_string();
        let resume_token = format!("TOK-{}", &Uuid::new_v4().simple().to_string()[..8]);
        self.sessions.lock().await.insert(
            resume_token.clone(),
            StubSession {
                session_id: session_id.clone(),
                account_type,
                language: language.to_string(),
            },
        );
        Ok(SessionHandle {
            session_id,
            resume_token,
        })
    }

    async fn resume_session(&self, resume_token: &str) -> Result<ResumedSession, BackendError> {
        if self.blocking_should_fail() {
            return Err(BackendError::RequestFailed {
                endpoint: "resume".to_string(),
                reason: "stub failure".to_string(),
            });
        }
        let sessions = self.sessions.lock().await;
        let session = sessions
            .get(resume_token)
            .ok_or(BackendError::InvalidResumeToken)?;
        Ok(ResumedSession {
            session_id: session.session_id.clone(),
            profile: ResumedProfile {
                account_type: Some(session.account_type),
                full_name: None,
                language: Some(session.language.clone()),
            },
        })
    }

    async fn scan_document(&self, file: Vec<u8>) -> Result<ScanOutcome, BackendError> {
        if self.blocking_should_fail() {
            return Err(BackendError::ScanFailed {
                reason: "stub failure".to_string(),
            });
        }
        if file.is_empty() {
            return Err(BackendError::ScanFailed {
                reason: "empty file".to_string(),
            });
        }
        Ok(ScanOutcome {
            fields: IdentityFields {
                full_name: Some("Rajesh Kumar".to_string()),
                dob: Some("1990-06-15".to_string()),
                gender: Some("Male".to_string()),
                id_number: Some("ABCPK1234F".to_string()),
                address: Some("D-14, Sector 62, Noida, Uttar Pradesh 201301".to_string()),
            },
            risk: Self::score(&*self.profile.lock().await),
        })
    }

    async fn issue_pran(&self) -> Result<PranIssuance, BackendError> {
        if self.blocking_should_fail() {
            return Err(BackendError::IssuanceFailed {
                reason: "stub failure".to_string(),
            });
        }
        Ok(PranIssuance {
            pran: Self::generate_pran(),
            issued_at: Utc::now(),
        })
    }

    async fn update_profile(&self, update: ProfileUpdate) -> Result<RiskSignal, BackendError> {
        let mut profile = self.profile.lock().await;
        if update.tax_resident.is_some() {
            profile.tax_resident = update.tax_resident;
        }
        if update.pep.is_some() {
            profile.pep = update.pep;
        }
        if update.contribution_amount.is_some() {
            profile.contribution_amount = update.contribution_amount;
        }
        if update.kyc_method.is_some() {
            profile.kyc_method = update.kyc_method;
        }
        Ok(Self::score(&profile))
    }

    async fn archive_consent(
        &self,
        _consent_type: &str,
        _consent_text: &str,
        _metadata: serde_json::Value,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn send_notification(
        &self,
        _channel: NotificationChannel,
        _recipient: &str,
        _message: &str,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn chat(&self, _query: &str) -> Result<String, BackendError> {
        Err(BackendError::RequestFailed {
            endpoint: "chat".to_string(),
            reason: "no assistant configured".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resume_roundtrip() {
        let stub = StubBackend::new();
        let handle = stub
            .start_session("hi", AccountType::Corporate)
            .await
            .unwrap();
        let resumed = stub.resume_session(&handle.resume_token).await.unwrap();
        assert_eq!(resumed.session_id, handle.session_id);
        assert_eq!(resumed.profile.account_type, Some(AccountType::Corporate));
        assert_eq!(resumed.profile.language.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let stub = StubBackend::new();
        let err = stub.resume_session("TOK-nope").await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidResumeToken));
    }

    #[tokio::test]
    async fn profile_answers_drive_risk() {
        let stub = StubBackend::new();
        let signal = stub
            .update_profile(ProfileUpdate {
                pep: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(signal.tier, RiskTier::Standard);

        let signal = stub
            .update_profile(ProfileUpdate {
                tax_resident: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(signal.tier, RiskTier::High);
        assert!(signal.reasons.iter().any(|r| r == "Foreign Tax Resident"));
    }

    #[tokio::test]
    async fn high_value_contribution_is_medium() {
        let stub = StubBackend::new();
        let signal = stub
            .update_profile(ProfileUpdate {
                contribution_amount: Some(2_000_000),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(signal.tier, RiskTier::Medium);
    }

    #[tokio::test]
    async fn pran_has_issued_format() {
        let stub = StubBackend::new();
        let issuance = stub.issue_pran().await.unwrap();
        let parts: Vec<&str> = issuance.pran.split(' ').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 4);
        assert!(issuance.pran.starts_with("11"));
    }

    #[tokio::test]
    async fn blocking_failure_toggle() {
        let stub = StubBackend::new();
        stub.set_fail_blocking(true);
        assert!(stub.issue_pran().await.is_err());
        assert!(stub.scan_document(vec![1]).await.is_err());
        stub.set_fail_blocking(false);
        assert!(stub.issue_pran().await.is_ok());
    }
}
