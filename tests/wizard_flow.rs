//! End-to-end wizard flows against the in-process stub backend.

use std::sync::Arc;

use pension_wizard::backend::{OnboardingBackend, StubBackend};
use pension_wizard::store::LibSqlStore;
use pension_wizard::wizard::model::{
    AccountType, CorporateDetails, EsignMethod, IdentityFields, KycMethod, PaymentMethod, Scheme,
};
use pension_wizard::wizard::validate::Field;
use pension_wizard::{AdvanceOutcome, WizardConfig, WizardController, WizardStep};

use chrono::NaiveDate;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

async fn new_controller() -> (WizardController, Arc<StubBackend>, Arc<LibSqlStore>) {
    init_tracing();
    let backend = Arc::new(StubBackend::new());
    let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let controller = WizardController::new(
        WizardConfig::default(),
        backend.clone(),
        store.clone(),
        "en",
    );
    (controller, backend, store)
}

async fn must_move(controller: &WizardController) -> WizardStep {
    match controller.advance().await.unwrap() {
        AdvanceOutcome::Moved(step) => step,
        AdvanceOutcome::Blocked(v) => panic!("blocked at {:?}: {:?}", v.step, v.missing),
    }
}

#[tokio::test]
async fn citizen_happy_path() {
    let (controller, _, _) = new_controller().await;

    assert_eq!(controller.current_step().await, WizardStep::Gate);
    assert_eq!(controller.progress_percent().await, 0);

    // Gate: pick the citizen track.
    controller.set_account_type(AccountType::Citizen).await;
    assert_eq!(must_move(&controller).await, WizardStep::Identity);
    assert_eq!(controller.progress_percent().await, 25);

    // Identity: consent then smart-scan, which also seeds the risk signal.
    controller
        .select_kyc_method(KycMethod::SmartScan)
        .await
        .unwrap();
    controller
        .grant_consent("I authorise the KYC data fetch")
        .await
        .unwrap();
    let scan = controller.scan_document(vec![0xFF, 0xD8, 0xFF]).await.unwrap();
    assert!(scan.fields.full_name.is_some());
    assert_eq!(must_move(&controller).await, WizardStep::Profile);
    assert_eq!(controller.progress_percent().await, 50);

    // Profile: an adult nominee needs no guardian.
    controller
        .edit_profile(|p| {
            p.occupation = "self-employed".to_string();
            p.income_range = "10-25L".to_string();
            p.marital_status = "single".to_string();
            p.nominee.name = "Meera Iyer".to_string();
            p.nominee.relationship = "mother".to_string();
            p.nominee.dob = NaiveDate::from_ymd_opt(1962, 11, 3);
        })
        .await;
    assert_eq!(must_move(&controller).await, WizardStep::Investment);
    assert_eq!(controller.progress_percent().await, 75);

    // Investment: auto choice skips the allocation sliders.
    controller
        .edit_investment(|inv| {
            inv.scheme = Some(Scheme::Auto);
            inv.cra = "protean".to_string();
            inv.primary_fund_manager = "lic".to_string();
        })
        .await;
    assert_eq!(must_move(&controller).await, WizardStep::Confirmation);
    assert_eq!(controller.progress_percent().await, 100);

    // Confirmation: regulatory answers, payment, e-sign, then submit.
    controller.answer_tax_residency(false).await;
    controller.answer_pep(false).await;
    controller.set_declaration_accepted(true).await;
    controller.set_payment_method(PaymentMethod::UpiLite).await;
    controller.set_contribution_amount(500).await.unwrap();
    controller.complete_esign(EsignMethod::AadhaarOtp).await;

    assert_eq!(must_move(&controller).await, WizardStep::Success);
    assert_eq!(controller.progress_percent().await, 100);
    let issued = controller.issued_account().await.expect("PRAN issued");
    assert_eq!(issued.pran.replace(' ', "").len(), 12);
}

#[tokio::test]
async fn corporate_gate_demands_employer_details() {
    let (controller, _, _) = new_controller().await;
    controller.set_account_type(AccountType::Corporate).await;

    let AdvanceOutcome::Blocked(v) = controller.advance().await.unwrap() else {
        panic!("expected blocked");
    };
    assert_eq!(
        v.missing,
        vec![
            Field::EmployeeId,
            Field::CorpRegistration,
            Field::RetirementDate
        ]
    );

    controller
        .set_corporate_details(CorporateDetails {
            employee_id: "EMP-1204".to_string(),
            corp_registration: "CIN-U65999MH".to_string(),
            retirement_date: "2048-03-31".to_string(),
        })
        .await;
    assert_eq!(must_move(&controller).await, WizardStep::Identity);
}

#[tokio::test]
async fn minor_nominee_requires_guardian() {
    let (controller, _, _) = new_controller().await;
    controller.set_account_type(AccountType::Citizen).await;
    must_move(&controller).await;
    controller
        .select_kyc_method(KycMethod::AadhaarOtp)
        .await
        .unwrap();
    controller.grant_consent("ok").await.unwrap();
    controller
        .complete_identity_fetch(IdentityFields::default())
        .await
        .unwrap();
    must_move(&controller).await;

    // Roughly ten years old.
    let minor_dob = chrono::Utc::now().date_naive() - chrono::Duration::days(3650);
    controller
        .edit_profile(|p| {
            p.occupation = "salaried".to_string();
            p.income_range = "5-10L".to_string();
            p.marital_status = "married".to_string();
            p.nominee.name = "Kavya".to_string();
            p.nominee.relationship = "daughter".to_string();
            p.nominee.dob = Some(minor_dob);
        })
        .await;

    let AdvanceOutcome::Blocked(v) = controller.advance().await.unwrap() else {
        panic!("expected blocked");
    };
    assert_eq!(v.missing, vec![Field::GuardianName]);

    controller
        .edit_profile(|p| p.nominee.guardian_name = "Anita Rao".to_string())
        .await;
    assert_eq!(must_move(&controller).await, WizardStep::Investment);
}

#[tokio::test]
async fn active_scheme_requires_balanced_allocation() {
    let (controller, _, _) = new_controller().await;
    controller.set_account_type(AccountType::Citizen).await;
    must_move(&controller).await;
    controller
        .select_kyc_method(KycMethod::Ckyc)
        .await
        .unwrap();
    controller.grant_consent("ok").await.unwrap();
    controller
        .complete_identity_fetch(IdentityFields::default())
        .await
        .unwrap();
    must_move(&controller).await;
    controller
        .edit_profile(|p| {
            p.occupation = "salaried".to_string();
            p.income_range = "5-10L".to_string();
            p.marital_status = "single".to_string();
            p.nominee.name = "Arun".to_string();
            p.nominee.relationship = "father".to_string();
            p.nominee.dob = NaiveDate::from_ymd_opt(1958, 7, 21);
        })
        .await;
    must_move(&controller).await;

    controller
        .edit_investment(|inv| {
            inv.scheme = Some(Scheme::Active);
            inv.cra = "cams".to_string();
            inv.primary_fund_manager = "hdfc".to_string();
            inv.allocation.equity = 40; // sums to 90
        })
        .await;
    let AdvanceOutcome::Blocked(v) = controller.advance().await.unwrap() else {
        panic!("expected blocked");
    };
    assert!(v.missing.contains(&Field::Allocation));

    controller
        .edit_investment(|inv| inv.allocation.equity = 50)
        .await;
    assert_eq!(must_move(&controller).await, WizardStep::Confirmation);
}

#[tokio::test]
async fn resume_always_reenters_at_identity() {
    let backend = Arc::new(StubBackend::new());
    let handle = backend
        .start_session("ta", AccountType::Citizen)
        .await
        .unwrap();

    let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let controller =
        WizardController::new(WizardConfig::default(), backend, store, "en");

    let resumed = controller.resume(&handle.resume_token).await.unwrap();
    assert_eq!(resumed.session_id, handle.session_id);
    assert_eq!(controller.current_step().await, WizardStep::Identity);
    assert_eq!(controller.fields().await.language, "ta");
}

#[tokio::test]
async fn invalid_resume_token_is_harmless() {
    let (controller, _, _) = new_controller().await;
    controller.set_account_type(AccountType::Citizen).await;
    must_move(&controller).await;

    assert!(controller.resume("TOK-expired1").await.is_err());
    assert_eq!(controller.current_step().await, WizardStep::Identity);
    assert!(!controller.is_busy().await);
}

#[tokio::test]
async fn save_then_restore_in_new_session() {
    let backend = Arc::new(StubBackend::new());
    let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let controller = WizardController::new(
        WizardConfig::default(),
        backend.clone(),
        store.clone(),
        "en",
    );

    controller.set_account_type(AccountType::Citizen).await;
    must_move(&controller).await;
    controller
        .select_kyc_method(KycMethod::Bank)
        .await
        .unwrap();
    controller.grant_consent("ok").await.unwrap();
    controller
        .complete_identity_fetch(IdentityFields {
            full_name: Some("Sunil Shah".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    controller.save_progress().await.unwrap();

    let restored_controller =
        WizardController::new(WizardConfig::default(), backend, store, "en");
    let snapshot = restored_controller
        .restore_snapshot()
        .await
        .unwrap()
        .expect("saved snapshot present");
    assert_eq!(snapshot.step, WizardStep::Identity);
    assert_eq!(snapshot.kyc_method, Some(KycMethod::Bank));
    assert!(restored_controller.fields().await.identity.fetched);
}

#[tokio::test]
async fn issuance_retry_in_place() {
    let backend = Arc::new(StubBackend::new());
    let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let controller = WizardController::new(
        WizardConfig::default(),
        backend.clone(),
        store,
        "en",
    );

    controller.set_account_type(AccountType::Citizen).await;
    must_move(&controller).await;
    controller
        .select_kyc_method(KycMethod::DigiLocker)
        .await
        .unwrap();
    controller.grant_consent("ok").await.unwrap();
    controller
        .complete_identity_fetch(IdentityFields::default())
        .await
        .unwrap();
    must_move(&controller).await;
    controller
        .edit_profile(|p| {
            p.occupation = "salaried".to_string();
            p.income_range = "25L+".to_string();
            p.marital_status = "married".to_string();
            p.nominee.name = "Divya".to_string();
            p.nominee.relationship = "spouse".to_string();
            p.nominee.dob = NaiveDate::from_ymd_opt(1990, 1, 1);
        })
        .await;
    must_move(&controller).await;
    controller
        .edit_investment(|inv| {
            inv.scheme = Some(Scheme::Auto);
            inv.cra = "kfintech".to_string();
            inv.primary_fund_manager = "icici".to_string();
        })
        .await;
    must_move(&controller).await;
    controller.answer_tax_residency(false).await;
    controller.answer_pep(false).await;
    controller.set_declaration_accepted(true).await;
    controller.set_payment_method(PaymentMethod::Netbanking).await;
    controller.set_contribution_amount(5000).await.unwrap();
    controller.complete_esign(EsignMethod::Dsc).await;

    backend.set_fail_blocking(true);
    assert!(controller.advance().await.is_err());
    assert_eq!(controller.current_step().await, WizardStep::Confirmation);
    assert!(controller.issued_account().await.is_none());

    backend.set_fail_blocking(false);
    assert_eq!(must_move(&controller).await, WizardStep::Success);
    assert!(controller.issued_account().await.is_some());
}
