//! Risk framing — merges the server risk signal with the one local override.
//!
//! Scoring lives on the backend (it sees PEP/tax answers, contribution size,
//! cross-session anomalies). The client holds exactly one rule of its own:
//! a face-to-face manual document upload elevates Standard to an enhanced
//! framing. The result is advisory — it changes messaging and recommends an
//! assisted-verification upgrade, it never blocks progression.

use serde::{Deserialize, Serialize};

use crate::wizard::model::KycMethod;

/// Risk tier as named by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskTier {
    Standard,
    Medium,
    High,
}

impl Default for RiskTier {
    fn default() -> Self {
        Self::Standard
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "Standard"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Risk level plus human-readable reasons, as returned by the backend after
/// a document scan or a profile update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSignal {
    #[serde(rename = "risk_level")]
    pub tier: RiskTier,
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// Reason attached by the local override.
const MANUAL_UPLOAD_REASON: &str = "Manual document upload";

/// Derives the displayed risk framing for the session.
pub struct RiskClassifier;

impl RiskClassifier {
    /// Merge the latest server signal (if any) with the KYC-method override.
    ///
    /// Manual upload elevates Standard to Medium; a server signal that is
    /// already Medium or High is kept as-is, reasons appended.
    pub fn classify(server: Option<&RiskSignal>, method: Option<KycMethod>) -> RiskSignal {
        let mut signal = server.cloned().unwrap_or_default();

        if method.is_some_and(|m| m.is_face_to_face()) {
            if signal.tier == RiskTier::Standard {
                signal.tier = RiskTier::Medium;
            }
            if !signal.reasons.iter().any(|r| r == MANUAL_UPLOAD_REASON) {
                signal.reasons.push(MANUAL_UPLOAD_REASON.to_string());
            }
        }

        signal
    }

    /// Whether an assisted video-verification upgrade should be recommended.
    pub fn recommends_assisted_verification(tier: RiskTier) -> bool {
        matches!(tier, RiskTier::Medium | RiskTier::High)
    }

    /// Whether enhanced due diligence applies.
    pub fn requires_enhanced_due_diligence(tier: RiskTier) -> bool {
        tier == RiskTier::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_signal_no_override_is_standard() {
        let s = RiskClassifier::classify(None, Some(KycMethod::Ckyc));
        assert_eq!(s.tier, RiskTier::Standard);
        assert!(s.reasons.is_empty());
    }

    #[test]
    fn manual_upload_elevates_standard() {
        let s = RiskClassifier::classify(None, Some(KycMethod::ManualUpload));
        assert_eq!(s.tier, RiskTier::Medium);
        assert_eq!(s.reasons, vec![MANUAL_UPLOAD_REASON.to_string()]);
    }

    #[test]
    fn manual_upload_never_downgrades_server_high() {
        let server = RiskSignal {
            tier: RiskTier::High,
            reasons: vec!["PEP Detected".to_string()],
        };
        let s = RiskClassifier::classify(Some(&server), Some(KycMethod::ManualUpload));
        assert_eq!(s.tier, RiskTier::High);
        assert_eq!(s.reasons.len(), 2);
    }

    #[test]
    fn override_reason_not_duplicated() {
        let server = RiskSignal {
            tier: RiskTier::Medium,
            reasons: vec![MANUAL_UPLOAD_REASON.to_string()],
        };
        let s = RiskClassifier::classify(Some(&server), Some(KycMethod::ManualUpload));
        assert_eq!(s.reasons.len(), 1);
    }

    #[test]
    fn server_signal_passes_through_for_digital_methods() {
        let server = RiskSignal {
            tier: RiskTier::High,
            reasons: vec!["Foreign Tax Resident".to_string()],
        };
        let s = RiskClassifier::classify(Some(&server), Some(KycMethod::DigiLocker));
        assert_eq!(s, server);
    }

    #[test]
    fn advisory_thresholds() {
        assert!(!RiskClassifier::recommends_assisted_verification(RiskTier::Standard));
        assert!(RiskClassifier::recommends_assisted_verification(RiskTier::Medium));
        assert!(RiskClassifier::recommends_assisted_verification(RiskTier::High));
        assert!(!RiskClassifier::requires_enhanced_due_diligence(RiskTier::Medium));
        assert!(RiskClassifier::requires_enhanced_due_diligence(RiskTier::High));
    }

    #[test]
    fn signal_serde_matches_backend_shape() {
        let json = r#"{"risk_level":"High","reasons":["PEP Detected"]}"#;
        let s: RiskSignal = serde_json::from_str(json).unwrap();
        assert_eq!(s.tier, RiskTier::High);
        assert_eq!(s.reasons, vec!["PEP Detected".to_string()]);
    }
}
