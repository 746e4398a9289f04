//! Local durable storage for save/resume.
//!
//! A small key-value seam: the snapshot blob lives under one fixed key, the
//! session id and resume token under their own keys. The blob carries a
//! schema version tag so a later release can refuse or migrate old saves.

pub mod libsql_store;

pub use libsql_store::LibSqlStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::wizard::model::{
    AccountType, ComplianceRecord, FieldStore, KycMethod, PaymentSelection, Scheme,
};
use crate::wizard::step::WizardStep;

/// Fixed storage keys.
pub mod keys {
    /// The serialized [`super::Snapshot`].
    pub const SNAPSHOT: &str = "onboarding_progress";
    /// The backend session identifier.
    pub const SESSION_ID: &str = "session_id";
    /// The opaque resume token.
    pub const RESUME_TOKEN: &str = "resume_token";
}

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Async key-value store for JSON blobs.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;
    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError>;
    /// Returns whether a value was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
}

/// The persisted save blob: step index plus the answers worth restoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub step: WizardStep,
    pub account_type: Option<AccountType>,
    pub kyc_method: Option<KycMethod>,
    pub identity_fetched: bool,
    pub language: String,
    pub scheme: Option<Scheme>,
    pub compliance: ComplianceRecord,
    pub payment: PaymentSelection,
}

impl Snapshot {
    /// Capture the current answers and step.
    pub fn capture(fields: &FieldStore, step: WizardStep) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            step,
            account_type: fields.account_type,
            kyc_method: fields.identity.method,
            identity_fetched: fields.identity.fetched,
            language: fields.language.clone(),
            scheme: fields.investment.scheme,
            compliance: fields.compliance.clone(),
            payment: fields.payment.clone(),
        }
    }

    /// Decode a stored blob, rejecting unknown schema versions.
    pub fn decode(value: &serde_json::Value) -> Result<Self, StoreError> {
        let version = value
            .get("version")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        if version != SNAPSHOT_VERSION {
            return Err(StoreError::VersionMismatch {
                found: version,
                expected: SNAPSHOT_VERSION,
            });
        }
        serde_json::from_value(value.clone())
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Write the captured answers back into a field store.
    pub fn apply(&self, fields: &mut FieldStore) {
        fields.account_type = self.account_type;
        fields.identity.method = self.kyc_method;
        fields.identity.fetched = self.identity_fetched;
        fields.language = self.language.clone();
        fields.investment.scheme = self.scheme;
        fields.compliance = self.compliance.clone();
        fields.payment = self.payment.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::model::PaymentMethod;

    #[test]
    fn capture_apply_roundtrip() {
        let mut fields = FieldStore::new("ta");
        fields.account_type = Some(AccountType::Citizen);
        fields.identity.method = Some(KycMethod::AadhaarOtp);
        fields.identity.fetched = true;
        fields.investment.scheme = Some(Scheme::Active);
        fields.compliance.consent_accepted = true;
        fields.payment.method = Some(PaymentMethod::Card);
        fields.payment.contribution_amount = 1500;

        let snap = Snapshot::capture(&fields, WizardStep::Investment);
        let mut restored = FieldStore::default();
        snap.apply(&mut restored);

        assert_eq!(restored.account_type, Some(AccountType::Citizen));
        assert_eq!(restored.identity.method, Some(KycMethod::AadhaarOtp));
        assert!(restored.identity.fetched);
        assert_eq!(restored.language, "ta");
        assert_eq!(restored.investment.scheme, Some(Scheme::Active));
        assert!(restored.compliance.consent_accepted);
        assert_eq!(restored.payment.contribution_amount, 1500);
    }

    #[test]
    fn decode_accepts_current_version() {
        let snap = Snapshot::capture(&FieldStore::new("en"), WizardStep::Gate);
        let value = serde_json::to_value(&snap).unwrap();
        let decoded = Snapshot::decode(&value).unwrap();
        assert_eq!(decoded.version, SNAPSHOT_VERSION);
        assert_eq!(decoded.step, WizardStep::Gate);
    }

    #[test]
    fn decode_rejects_unknown_version() {
        let snap = Snapshot::capture(&FieldStore::new("en"), WizardStep::Gate);
        let mut value = serde_json::to_value(&snap).unwrap();
        value["version"] = serde_json::json!(99);
        let err = Snapshot::decode(&value).unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionMismatch {
                found: 99,
                expected: SNAPSHOT_VERSION
            }
        ));
    }

    #[test]
    fn decode_rejects_untagged_blob() {
        let err = Snapshot::decode(&serde_json::json!({"step": "gate"})).unwrap_err();
        assert!(matches!(err, StoreError::VersionMismatch { found: 0, .. }));
    }
}
