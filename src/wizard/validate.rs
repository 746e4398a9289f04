//! Per-step gating predicates.
//!
//! Each validator is a pure function over the current [`FieldStore`] — no side
//! effects, cheap enough to re-run on every keystroke. The result carries the
//! typed fields still missing so UIs can light per-field errors after an
//! explicit advance attempt (and only then).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::model::{AccountType, FieldStore, Scheme};
use super::step::WizardStep;

/// Every input the wizard gates on, as a typed identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    AccountType,
    EmployeeId,
    CorpRegistration,
    RetirementDate,
    IdentityFetched,
    Occupation,
    IncomeRange,
    MaritalStatus,
    NomineeName,
    NomineeRelationship,
    NomineeDob,
    GuardianName,
    Scheme,
    Cra,
    PrimaryFundManager,
    Allocation,
    TaxResidency,
    TaxCountry,
    Pep,
    Consent,
}

/// Outcome of validating one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepValidation {
    pub step: WizardStep,
    pub missing: Vec<Field>,
}

impl StepValidation {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Validate `step` against the current answers, using the wall clock for the
/// nominee minor-age rule.
pub fn validate(step: WizardStep, store: &FieldStore) -> StepValidation {
    validate_at(step, store, Utc::now())
}

/// Validate `step` at an explicit instant (deterministic for tests).
pub fn validate_at(step: WizardStep, store: &FieldStore, now: DateTime<Utc>) -> StepValidation {
    let mut missing = Vec::new();

    match step {
        WizardStep::Gate => {
            match store.account_type {
                None => missing.push(Field::AccountType),
                Some(AccountType::Corporate) => {
                    push_if_blank(&mut missing, &store.corporate.employee_id, Field::EmployeeId);
                    push_if_blank(
                        &mut missing,
                        &store.corporate.corp_registration,
                        Field::CorpRegistration,
                    );
                    push_if_blank(
                        &mut missing,
                        &store.corporate.retirement_date,
                        Field::RetirementDate,
                    );
                }
                Some(AccountType::Citizen) => {}
            }
        }
        WizardStep::Identity => {
            // Set only after a completed KYC method flow.
            if !store.identity.fetched {
                missing.push(Field::IdentityFetched);
            }
        }
        WizardStep::Profile => {
            let p = &store.profile;
            push_if_blank(&mut missing, &p.occupation, Field::Occupation);
            push_if_blank(&mut missing, &p.income_range, Field::IncomeRange);
            push_if_blank(&mut missing, &p.marital_status, Field::MaritalStatus);
            push_if_blank(&mut missing, &p.nominee.name, Field::NomineeName);
            push_if_blank(
                &mut missing,
                &p.nominee.relationship,
                Field::NomineeRelationship,
            );
            match p.nominee.dob {
                None => missing.push(Field::NomineeDob),
                Some(dob) => {
                    if is_minor(dob, now) && p.nominee.guardian_name.trim().is_empty() {
                        missing.push(Field::GuardianName);
                    }
                }
            }
        }
        WizardStep::Investment => {
            let inv = &store.investment;
            match inv.scheme {
                None => missing.push(Field::Scheme),
                Some(Scheme::Active) => {
                    if !inv.allocation.is_balanced() {
                        missing.push(Field::Allocation);
                    }
                }
                Some(Scheme::Auto) => {}
            }
            push_if_blank(&mut missing, &inv.cra, Field::Cra);
            push_if_blank(&mut missing, &inv.primary_fund_manager, Field::PrimaryFundManager);
        }
        WizardStep::Confirmation => {
            let c = &store.compliance;
            match c.tax_resident_outside_india {
                None => missing.push(Field::TaxResidency),
                Some(true) => {
                    push_if_blank(&mut missing, &c.tax_country, Field::TaxCountry);
                }
                Some(false) => {}
            }
            if c.politically_exposed.is_none() {
                missing.push(Field::Pep);
            }
            if !c.consent_accepted {
                missing.push(Field::Consent);
            }
        }
        // Nothing left to collect once the account is issued.
        WizardStep::Success => {}
    }

    StepValidation { step, missing }
}

/// Minor-age rule: age in years = (now − dob) / 365.25 days, minor iff < 18.
///
/// This is the product's approximation, not calendar-accurate — keep it.
pub fn is_minor(dob: NaiveDate, now: DateTime<Utc>) -> bool {
    let days = (now.date_naive() - dob).num_days();
    (days as f64) / 365.25 < 18.0
}

/// How many required profile fields are still blank (the "N fields remaining"
/// counter; guardian excluded, it only appears for minor nominees).
pub fn profile_fields_remaining(store: &FieldStore) -> usize {
    let p = &store.profile;
    [
        p.occupation.as_str(),
        p.income_range.as_str(),
        p.marital_status.as_str(),
        p.nominee.name.as_str(),
        p.nominee.relationship.as_str(),
    ]
    .iter()
    .filter(|v| v.trim().is_empty())
    .count()
        + usize::from(p.nominee.dob.is_none())
}

fn push_if_blank(missing: &mut Vec<Field>, value: &str, field: Field) {
    if value.trim().is_empty() {
        missing.push(field);
    }
}
