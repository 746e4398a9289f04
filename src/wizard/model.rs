//! Answer-set data model: every record the wizard collects before submission.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::risk::RiskSignal;

/// Which sign-up track the subscriber is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Citizen,
    Corporate,
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Citizen => write!(f, "citizen"),
            Self::Corporate => write!(f, "corporate"),
        }
    }
}

/// Employer-track details, required only for corporate accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorporateDetails {
    pub employee_id: String,
    pub corp_registration: String,
    pub retirement_date: String,
}

/// How the subscriber's identity is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycMethod {
    Ckyc,
    Bank,
    AadhaarOtp,
    ManualUpload,
    SmartScan,
    #[serde(rename = "digilocker")]
    DigiLocker,
}

impl KycMethod {
    /// Whether the method involves a face-to-face (non-digital) document flow.
    pub fn is_face_to_face(&self) -> bool {
        matches!(self, Self::ManualUpload)
    }
}

impl std::fmt::Display for KycMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ckyc => "ckyc",
            Self::Bank => "bank",
            Self::AadhaarOtp => "aadhaar_otp",
            Self::ManualUpload => "manual_upload",
            Self::SmartScan => "smart_scan",
            Self::DigiLocker => "digilocker",
        };
        write!(f, "{s}")
    }
}

/// Identity fields returned by a completed KYC flow. Display-only; the wizard
/// never edits these after the fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// KYC state for the session.
///
/// Invariant: once `fetched` is true the method cannot silently change —
/// the controller requires the consent to be reset first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub method: Option<KycMethod>,
    pub consent_granted: bool,
    pub fetched: bool,
    pub fields: IdentityFields,
}

/// Nominee details collected in the profile step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nominee {
    pub name: String,
    pub relationship: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<NaiveDate>,
    /// Required iff the nominee is a minor at validation time.
    pub guardian_name: String,
}

/// Profile answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub occupation: String,
    pub income_range: String,
    pub marital_status: String,
    pub nominee: Nominee,
}

/// Investment-management mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    /// Lifecycle glide path — allocation managed by age.
    Auto,
    /// Subscriber-specified allocation across asset classes.
    Active,
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// Percentage split across the three asset classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub equity: u8,
    pub corporate: u8,
    pub government: u8,
}

impl Allocation {
    pub fn sum(&self) -> u16 {
        u16::from(self.equity) + u16::from(self.corporate) + u16::from(self.government)
    }

    /// An active-choice allocation must sum to exactly 100.
    pub fn is_balanced(&self) -> bool {
        self.sum() == 100
    }
}

impl Default for Allocation {
    fn default() -> Self {
        // Default slider positions shown before the user adjusts anything.
        Self {
            equity: 50,
            corporate: 30,
            government: 20,
        }
    }
}

/// Investment choices.
///
/// If `scheme` is Auto, `allocation` and `secondary_fund_manager` are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestmentSelection {
    pub scheme: Option<Scheme>,
    pub cra: String,
    pub primary_fund_manager: String,
    pub secondary_fund_manager: String,
    pub allocation: Allocation,
}

/// Regulatory answers from the confirmation step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRecord {
    /// None = not yet answered.
    pub tax_resident_outside_india: Option<bool>,
    /// Required iff `tax_resident_outside_india == Some(true)`.
    pub tax_country: String,
    pub politically_exposed: Option<bool>,
    pub consent_accepted: bool,
}

/// Contribution payment channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Upi,
    UpiLite,
    Netbanking,
    Card,
}

/// Digital-signature channel for the application form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EsignMethod {
    AadhaarOtp,
    Dsc,
}

/// Payment and e-sign state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentSelection {
    pub method: Option<PaymentMethod>,
    /// Whole rupees; 0 = not yet entered. Minimum enforced by the controller.
    pub contribution_amount: u64,
    pub esign_method: Option<EsignMethod>,
    pub esign_complete: bool,
}

/// The single mutable answer set for the active session.
///
/// Owned exclusively by the controller; serialized wholesale for save/resume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldStore {
    pub account_type: Option<AccountType>,
    pub corporate: CorporateDetails,
    pub language: String,
    pub identity: IdentityRecord,
    pub profile: ProfileRecord,
    pub investment: InvestmentSelection,
    pub compliance: ComplianceRecord,
    pub payment: PaymentSelection,
    /// Latest server-side risk signal, if any. Merged with the local
    /// manual-upload override by the risk classifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskSignal>,
}

impl FieldStore {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Default::default()
        }
    }
}

/// Final account identifier issued on completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedAccount {
    pub pran: String,
    pub issued_at: DateTime<Utc>,
}
