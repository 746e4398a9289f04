//! The wizard controller.
//!
//! Owns the answer set, the step state machine, the backend collaborator, and
//! the local snapshot store. All mutation goes through here so the step
//! invariants hold: forward movement only through the gating validators,
//! identity immutability after a fetch, at most one blocking network call in
//! flight, and fire-and-forget side channels that never move the wizard.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tokio::task::AbortHandle;

use crate::backend::{
    NotificationChannel, OnboardingBackend, ProfileUpdate, ResumedSession, ScanOutcome,
    SessionHandle, spawn_best_effort,
};
use crate::config::WizardConfig;
use crate::error::{BackendError, Result, StoreError, WizardError};
use crate::risk::{RiskClassifier, RiskSignal};
use crate::store::{Snapshot, SnapshotStore, keys};
use crate::timer::{SessionTicker, SessionTimer};
use crate::wizard::model::{
    AccountType, CorporateDetails, EsignMethod, FieldStore, IdentityFields, InvestmentSelection,
    IssuedAccount, KycMethod, PaymentMethod, ProfileRecord,
};
use crate::wizard::step::WizardStep;
use crate::wizard::validate::{self, StepValidation};

/// Result of an advance attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The wizard moved to this step.
    Moved(WizardStep),
    /// The current step's gating failed; the wizard did not move.
    Blocked(StepValidation),
}

/// Reported connectivity, used by UIs to badge offline mode. The wizard keeps
/// working offline; only the blocking calls actually need the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    #[default]
    Online,
    Offline,
}

/// One blocking call in flight. The id ties the slot to the `run_blocking`
/// invocation that filled it, so a cancelled call can never clear a
/// successor's entry.
struct PendingOp {
    id: u64,
    operation: &'static str,
    abort: AbortHandle,
}

pub struct WizardController {
    config: WizardConfig,
    backend: Arc<dyn OnboardingBackend>,
    store: Arc<dyn SnapshotStore>,
    fields: Arc<RwLock<FieldStore>>,
    step: RwLock<WizardStep>,
    session: Arc<RwLock<Option<SessionHandle>>>,
    issued: RwLock<Option<IssuedAccount>>,
    /// Validation recorded on the last failed advance attempt. Per-field
    /// errors light up only after an explicit attempt, never while typing.
    last_attempt: RwLock<Option<StepValidation>>,
    pending: Mutex<Option<PendingOp>>,
    pending_seq: AtomicU64,
    timer: Mutex<Option<SessionTicker>>,
    connectivity: RwLock<Connectivity>,
}

impl WizardController {
    pub fn new(
        config: WizardConfig,
        backend: Arc<dyn OnboardingBackend>,
        store: Arc<dyn SnapshotStore>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            config,
            backend,
            store,
            fields: Arc::new(RwLock::new(FieldStore::new(language))),
            step: RwLock::new(WizardStep::Gate),
            session: Arc::new(RwLock::new(None)),
            issued: RwLock::new(None),
            last_attempt: RwLock::new(None),
            pending: Mutex::new(None),
            pending_seq: AtomicU64::new(0),
            timer: Mutex::new(None),
            connectivity: RwLock::new(Connectivity::Online),
        }
    }

    /// Start the session countdown. Replaces any previous ticker.
    pub async fn start_timer(&self) {
        let ticker = SessionTimer::new(&self.config).spawn();
        if let Some(old) = self.timer.lock().await.replace(ticker) {
            old.abort();
        }
    }

    /// Latest countdown state, if the timer is running.
    pub async fn timer_state(&self) -> Option<crate::timer::TimerState> {
        self.timer.lock().await.as_ref().map(|t| t.state())
    }

    // ---- navigation ----

    /// Attempt to move to the next step.
    ///
    /// From the confirmation step this submits the application. An incomplete
    /// step blocks the move and records the per-field validation for the UI.
    pub async fn advance(&self) -> Result<AdvanceOutcome> {
        let current = *self.step.read().await;
        if current.is_terminal() {
            return Err(WizardError::TerminalState.into());
        }
        if current == WizardStep::Confirmation {
            return self.submit().await;
        }

        let validation = {
            let fields = self.fields.read().await;
            validate::validate(current, &fields)
        };
        if !validation.is_complete() {
            tracing::debug!(step = %current, missing = ?validation.missing, "Advance blocked");
            *self.last_attempt.write().await = Some(validation.clone());
            return Ok(AdvanceOutcome::Blocked(validation));
        }

        let Some(next) = current.next() else {
            return Err(WizardError::TerminalState.into());
        };
        *self.step.write().await = next;
        *self.last_attempt.write().await = None;
        tracing::debug!(from = %current, to = %next, "Advanced");

        if current == WizardStep::Gate {
            self.spawn_session_start().await;
        }
        self.spawn_autosave().await;
        Ok(AdvanceOutcome::Moved(next))
    }

    /// Move back one step. Answers are kept; any blocking call still in
    /// flight for the abandoned step is cancelled. Returns the new step, or
    /// `None` at the gate or after completion.
    pub async fn retreat(&self) -> Option<WizardStep> {
        if let Some(op) = self.pending.lock().await.take() {
            op.abort.abort();
            tracing::debug!(operation = op.operation, "Cancelled in-flight call on retreat");
        }

        let mut step = self.step.write().await;
        if step.is_terminal() {
            return None;
        }
        let prev = step.prev()?;
        *step = prev;
        drop(step);

        *self.last_attempt.write().await = None;
        self.spawn_autosave().await;
        Some(prev)
    }

    /// Submit from the confirmation step: issue the account identifier and
    /// enter the terminal state. On failure the wizard stays on confirmation
    /// with every answer intact, so the user retries in place.
    pub async fn submit(&self) -> Result<AdvanceOutcome> {
        let current = *self.step.read().await;
        if current.is_terminal() {
            return Err(WizardError::TerminalState.into());
        }
        if current != WizardStep::Confirmation {
            return Err(WizardError::WrongStep {
                operation: "submit",
                expected: WizardStep::Confirmation,
                actual: current,
            }
            .into());
        }

        let validation = {
            let fields = self.fields.read().await;
            validate::validate(current, &fields)
        };
        if !validation.is_complete() {
            *self.last_attempt.write().await = Some(validation.clone());
            return Ok(AdvanceOutcome::Blocked(validation));
        }

        let backend = self.backend.clone();
        let issuance = self
            .run_blocking("account issuance", async move { backend.issue_pran().await })
            .await?;

        {
            // The user may have navigated away while issuance ran; a late
            // result must not complete a flow that was abandoned.
            let mut step = self.step.write().await;
            if *step != WizardStep::Confirmation {
                return Err(WizardError::Cancelled {
                    operation: "account issuance",
                }
                .into());
            }
            *self.issued.write().await = Some(IssuedAccount {
                pran: issuance.pran,
                issued_at: issuance.issued_at,
            });
            *step = WizardStep::Success;
        }
        *self.last_attempt.write().await = None;

        if let Some(ticker) = self.timer.lock().await.take() {
            ticker.abort();
        }

        // The flow is complete; the save blob and resume keys are now stale.
        let store = self.store.clone();
        spawn_best_effort("completed-session cleanup", async move {
            store.delete(keys::SNAPSHOT).await?;
            store.delete(keys::SESSION_ID).await?;
            store.delete(keys::RESUME_TOKEN).await?;
            Ok::<_, StoreError>(())
        });

        tracing::info!("Application submitted; account issued");
        Ok(AdvanceOutcome::Moved(WizardStep::Success))
    }

    // ---- blocking-call plumbing ----

    /// Run one blocking backend call with the single-flight guarantee.
    ///
    /// The spawned task's abort handle is parked in `pending` so navigation
    /// away can cancel it; a cancelled call surfaces as [`WizardError::Cancelled`].
    async fn run_blocking<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        T: Send + 'static,
        F: std::future::Future<Output = std::result::Result<T, BackendError>> + Send + 'static,
    {
        let id;
        let handle;
        {
            let mut pending = self.pending.lock().await;
            if let Some(p) = pending.as_ref() {
                return Err(WizardError::Busy {
                    operation: p.operation,
                }
                .into());
            }
            // Reserve the slot before releasing the lock so a concurrent
            // caller sees busy.
            id = self.pending_seq.fetch_add(1, Ordering::Relaxed);
            handle = tokio::spawn(fut);
            *pending = Some(PendingOp {
                id,
                operation,
                abort: handle.abort_handle(),
            });
        }

        let joined = handle.await;

        // Retreat empties the slot when it cancels us, and a new call may
        // have filled it again by the time we wake. Clear it only if it is
        // still ours; losing ownership means we were cancelled, and even a
        // result that won the race against the abort is discarded.
        let still_owner = {
            let mut pending = self.pending.lock().await;
            let owned = pending.as_ref().is_some_and(|op| op.id == id);
            if owned {
                pending.take();
            }
            owned
        };

        match joined {
            Ok(Ok(value)) if still_owner => Ok(value),
            Ok(Ok(_)) => Err(WizardError::Cancelled { operation }.into()),
            Ok(Err(e)) => Err(e.into()),
            Err(join) if join.is_cancelled() => Err(WizardError::Cancelled { operation }.into()),
            Err(join) => Err(BackendError::RequestFailed {
                endpoint: operation.to_string(),
                reason: format!("task failed: {join}"),
            }
            .into()),
        }
    }

    /// Whether a blocking call is in flight (drives the busy indicator).
    pub async fn is_busy(&self) -> bool {
        self.pending.lock().await.is_some()
    }

    // ---- identity step ----

    /// Select a KYC method. Rejected once identity details are fetched;
    /// switching methods before that resets any granted consent.
    pub async fn select_kyc_method(&self, method: KycMethod) -> Result<()> {
        let mut fields = self.fields.write().await;
        if fields.identity.fetched {
            return Err(WizardError::IdentityLocked.into());
        }
        fields.identity.method = Some(method);
        fields.identity.consent_granted = false;
        Ok(())
    }

    /// Record the subscriber's data-fetch consent and archive it server-side
    /// (best-effort).
    pub async fn grant_consent(&self, consent_text: &str) -> Result<()> {
        let method = {
            let mut fields = self.fields.write().await;
            let Some(method) = fields.identity.method else {
                return Err(WizardError::NoKycMethodSelected.into());
            };
            fields.identity.consent_granted = true;
            method
        };

        let backend = self.backend.clone();
        let text = consent_text.to_string();
        spawn_best_effort("consent archival", async move {
            backend
                .archive_consent(
                    "kyc_data_fetch",
                    &text,
                    json!({ "kyc_method": method.to_string() }),
                )
                .await
        });
        Ok(())
    }

    /// Withdraw consent before any fetch happened. Clears the method so the
    /// user picks again.
    pub async fn cancel_consent(&self) -> Result<()> {
        let mut fields = self.fields.write().await;
        if fields.identity.fetched {
            return Err(WizardError::IdentityLocked.into());
        }
        fields.identity.method = None;
        fields.identity.consent_granted = false;
        Ok(())
    }

    /// Explicit re-consent path: wipe the fetched identity so a different
    /// method can be used. This is the only way to change a fetched identity.
    pub async fn reset_identity(&self) {
        let mut fields = self.fields.write().await;
        fields.identity = Default::default();
    }

    /// Complete a non-scan KYC flow (CKYC, bank, Aadhaar OTP, DigiLocker,
    /// manual upload) with the fields the registry returned.
    ///
    /// Pushes the chosen method to the backend so the risk signal reflects it.
    pub async fn complete_identity_fetch(&self, identity: IdentityFields) -> Result<()> {
        let method = {
            let mut fields = self.fields.write().await;
            let Some(method) = fields.identity.method else {
                return Err(WizardError::NoKycMethodSelected.into());
            };
            if !fields.identity.consent_granted {
                return Err(WizardError::ConsentRequired.into());
            }
            fields.identity.fields = identity;
            fields.identity.fetched = true;
            method
        };

        self.push_risk_update(ProfileUpdate {
            kyc_method: Some(method),
            ..Default::default()
        })
        .await;
        self.spawn_autosave().await;
        Ok(())
    }

    /// OCR-scan an identity document. Blocking class: the UI shows a busy
    /// state and, on failure, a labeled retry; answers are untouched until
    /// the scan succeeds.
    pub async fn scan_document(&self, file: Vec<u8>) -> Result<ScanOutcome> {
        {
            let fields = self.fields.read().await;
            if fields.identity.fetched {
                return Err(WizardError::IdentityLocked.into());
            }
            if fields.identity.method.is_none() {
                return Err(WizardError::NoKycMethodSelected.into());
            }
            if !fields.identity.consent_granted {
                return Err(WizardError::ConsentRequired.into());
            }
        }

        let backend = self.backend.clone();
        let outcome = self
            .run_blocking("document scan", async move {
                backend.scan_document(file).await
            })
            .await?;

        {
            let mut fields = self.fields.write().await;
            // Consent may have been withdrawn or the identity completed
            // another way while the scan ran; a stale result is dropped.
            if !fields.identity.consent_granted || fields.identity.fetched {
                return Err(WizardError::Cancelled {
                    operation: "document scan",
                }
                .into());
            }
            fields.identity.fields = outcome.fields.clone();
            fields.identity.fetched = true;
            fields.risk = Some(outcome.risk.clone());
        }
        self.spawn_autosave().await;
        Ok(outcome)
    }

    // ---- gate / profile / investment answers ----

    pub async fn set_account_type(&self, account_type: AccountType) {
        self.fields.write().await.account_type = Some(account_type);
    }

    pub async fn set_corporate_details(&self, details: CorporateDetails) {
        self.fields.write().await.corporate = details;
    }

    pub async fn set_language(&self, language: impl Into<String>) {
        self.fields.write().await.language = language.into();
    }

    /// Edit profile answers in place.
    pub async fn edit_profile<F>(&self, edit: F)
    where
        F: FnOnce(&mut ProfileRecord),
    {
        edit(&mut self.fields.write().await.profile);
    }

    /// Edit investment choices in place.
    pub async fn edit_investment<F>(&self, edit: F)
    where
        F: FnOnce(&mut InvestmentSelection),
    {
        edit(&mut self.fields.write().await.investment);
    }

    // ---- confirmation answers ----

    /// Answer the foreign-tax-residency question. The backend re-scores risk
    /// on the side channel.
    pub async fn answer_tax_residency(&self, resident_outside_india: bool) {
        {
            let mut fields = self.fields.write().await;
            fields.compliance.tax_resident_outside_india = Some(resident_outside_india);
            if !resident_outside_india {
                fields.compliance.tax_country.clear();
            }
        }
        self.push_risk_update(ProfileUpdate {
            tax_resident: Some(resident_outside_india),
            ..Default::default()
        })
        .await;
    }

    pub async fn set_tax_country(&self, country: impl Into<String>) {
        self.fields.write().await.compliance.tax_country = country.into();
    }

    /// Answer the politically-exposed-person question.
    pub async fn answer_pep(&self, politically_exposed: bool) {
        self.fields.write().await.compliance.politically_exposed = Some(politically_exposed);
        self.push_risk_update(ProfileUpdate {
            pep: Some(politically_exposed),
            ..Default::default()
        })
        .await;
    }

    pub async fn set_declaration_accepted(&self, accepted: bool) {
        self.fields.write().await.compliance.consent_accepted = accepted;
    }

    pub async fn set_payment_method(&self, method: PaymentMethod) {
        self.fields.write().await.payment.method = Some(method);
    }

    /// Set the initial contribution. Amounts below the configured minimum are
    /// rejected and leave the stored amount unchanged.
    pub async fn set_contribution_amount(&self, amount: u64) -> Result<()> {
        if amount < self.config.min_contribution {
            return Err(WizardError::ContributionTooLow {
                amount,
                minimum: self.config.min_contribution,
            }
            .into());
        }
        self.fields.write().await.payment.contribution_amount = amount;
        self.push_risk_update(ProfileUpdate {
            contribution_amount: Some(amount),
            ..Default::default()
        })
        .await;
        Ok(())
    }

    pub async fn complete_esign(&self, method: EsignMethod) {
        let mut fields = self.fields.write().await;
        fields.payment.esign_method = Some(method);
        fields.payment.esign_complete = true;
    }

    // ---- save / resume ----

    /// Persist a snapshot now. Used by the explicit save-and-exit action;
    /// navigation also autosaves on the side channel.
    pub async fn save_progress(&self) -> Result<Snapshot> {
        let snapshot = {
            let fields = self.fields.read().await;
            Snapshot::capture(&fields, *self.step.read().await)
        };
        let value = serde_json::to_value(&snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.store.set(keys::SNAPSHOT, &value).await?;
        Ok(snapshot)
    }

    /// Restore the locally saved snapshot, if any. Answers and step come back
    /// exactly as saved.
    pub async fn restore_snapshot(&self) -> Result<Option<Snapshot>> {
        let Some(value) = self.store.get(keys::SNAPSHOT).await? else {
            return Ok(None);
        };
        let snapshot = Snapshot::decode(&value)?;
        snapshot.apply(&mut *self.fields.write().await);
        *self.step.write().await = snapshot.step;
        *self.last_attempt.write().await = None;
        Ok(Some(snapshot))
    }

    /// Resume a saved session by token. Blocking class.
    ///
    /// On success the recovered profile is applied and the wizard re-enters
    /// at the identity step regardless of how far the saved session had
    /// progressed. On any failure, including an invalid token, nothing
    /// changes.
    pub async fn resume(&self, resume_token: &str) -> Result<ResumedSession> {
        let backend = self.backend.clone();
        let token = resume_token.to_string();
        let resumed = self
            .run_blocking("resume lookup", async move {
                backend.resume_session(&token).await
            })
            .await?;

        {
            let mut fields = self.fields.write().await;
            if let Some(account_type) = resumed.profile.account_type {
                fields.account_type = Some(account_type);
            }
            if let Some(language) = &resumed.profile.language {
                fields.language = language.clone();
            }
            if let Some(name) = &resumed.profile.full_name {
                fields.identity.fields.full_name = Some(name.clone());
                fields.identity.fetched = true;
            }
        }
        *self.step.write().await = WizardStep::Identity;

        let handle = SessionHandle {
            session_id: resumed.session_id.clone(),
            resume_token: resume_token.to_string(),
        };
        *self.session.write().await = Some(handle.clone());
        self.persist_session_keys(&handle).await;

        tracing::info!(session_id = %resumed.session_id, "Session resumed at identity step");
        Ok(resumed)
    }

    /// Send the resume token to the subscriber over a notification channel.
    /// Best-effort; a missing token is logged and skipped.
    pub async fn share_resume_token(&self, channel: NotificationChannel, recipient: &str) {
        let Some(token) = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.resume_token.clone())
        else {
            tracing::warn!("No resume token available to share yet");
            return;
        };
        let backend = self.backend.clone();
        let recipient = recipient.to_string();
        spawn_best_effort("resume-token notification", async move {
            let message = format!(
                "Your pension onboarding is saved. Resume anytime with token {token}."
            );
            backend.send_notification(channel, &recipient, &message).await
        });
    }

    // ---- queries ----

    pub async fn current_step(&self) -> WizardStep {
        *self.step.read().await
    }

    /// Progress shown in the header, 0..=100.
    pub async fn progress_percent(&self) -> u8 {
        self.step
            .read()
            .await
            .progress_percent(self.config.total_steps)
    }

    /// Validate the current step without recording an attempt.
    pub async fn validation(&self) -> StepValidation {
        let step = *self.step.read().await;
        let fields = self.fields.read().await;
        validate::validate(step, &fields)
    }

    pub async fn can_advance(&self) -> bool {
        self.validation().await.is_complete()
    }

    /// The validation recorded on the last blocked advance, if the user has
    /// not moved since.
    pub async fn last_attempt(&self) -> Option<StepValidation> {
        self.last_attempt.read().await.clone()
    }

    /// Snapshot of the current answers.
    pub async fn fields(&self) -> FieldStore {
        self.fields.read().await.clone()
    }

    /// Effective risk assessment: the latest server signal merged with the
    /// local face-to-face override.
    pub async fn risk_assessment(&self) -> RiskSignal {
        let fields = self.fields.read().await;
        RiskClassifier::classify(fields.risk.as_ref(), fields.identity.method)
    }

    /// Remaining profile inputs, for the step-two progress hint.
    pub async fn profile_fields_remaining(&self) -> usize {
        validate::profile_fields_remaining(&*self.fields.read().await)
    }

    pub async fn session(&self) -> Option<SessionHandle> {
        self.session.read().await.clone()
    }

    pub async fn issued_account(&self) -> Option<IssuedAccount> {
        self.issued.read().await.clone()
    }

    pub async fn connectivity(&self) -> Connectivity {
        *self.connectivity.read().await
    }

    pub async fn set_online(&self, online: bool) {
        *self.connectivity.write().await = if online {
            Connectivity::Online
        } else {
            Connectivity::Offline
        };
    }

    // ---- side channels ----

    /// Open the backend session after the gate. Fire-and-forget: the wizard
    /// has already moved on when this resolves, and its failure only costs
    /// the resume capability.
    async fn spawn_session_start(&self) {
        let (language, account_type) = {
            let fields = self.fields.read().await;
            (fields.language.clone(), fields.account_type)
        };
        let Some(account_type) = account_type else {
            return;
        };

        let backend = self.backend.clone();
        let session = self.session.clone();
        let store = self.store.clone();
        spawn_best_effort("session start", async move {
            let handle = backend.start_session(&language, account_type).await?;
            if let Err(e) = store.set(keys::SESSION_ID, &json!(handle.session_id)).await {
                tracing::warn!("Failed to persist session id: {e}");
            }
            if let Err(e) = store
                .set(keys::RESUME_TOKEN, &json!(handle.resume_token))
                .await
            {
                tracing::warn!("Failed to persist resume token: {e}");
            }
            *session.write().await = Some(handle);
            Ok::<_, BackendError>(())
        });
    }

    async fn persist_session_keys(&self, handle: &SessionHandle) {
        let store = self.store.clone();
        let session_id = handle.session_id.clone();
        let resume_token = handle.resume_token.clone();
        spawn_best_effort("session key persistence", async move {
            store.set(keys::SESSION_ID, &json!(session_id)).await?;
            store.set(keys::RESUME_TOKEN, &json!(resume_token)).await?;
            Ok::<_, StoreError>(())
        });
    }

    /// Push changed profile answers to the backend and fold the refreshed
    /// risk signal back in. Best-effort; local answers already stand.
    async fn push_risk_update(&self, update: ProfileUpdate) {
        let backend = self.backend.clone();
        let fields = self.fields.clone();
        spawn_best_effort("risk signal update", async move {
            let signal = backend.update_profile(update).await?;
            fields.write().await.risk = Some(signal);
            Ok::<_, BackendError>(())
        });
    }

    /// Autosave the snapshot after navigation. Best-effort.
    async fn spawn_autosave(&self) {
        let snapshot = {
            let fields = self.fields.read().await;
            Snapshot::capture(&fields, *self.step.read().await)
        };
        let store = self.store.clone();
        spawn_best_effort("snapshot autosave", async move {
            let value = serde_json::to_value(&snapshot)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            store.set(keys::SNAPSHOT, &value).await?;
            Ok::<_, StoreError>(())
        });
    }
}
