//! Multi-phase pension-account onboarding engine.
//!
//! A headless wizard for opening a retirement account: a linear step state
//! machine (gate, identity, profile, investment, confirmation, success) over
//! a single mutable answer set, with pure per-step gating validators, a
//! server-driven risk signal, a session countdown, and save/resume backed by
//! a local snapshot store.
//!
//! The [`wizard::WizardController`] is the entry point; it talks to the
//! outside world only through the [`backend::OnboardingBackend`] trait, with
//! [`backend::HttpBackend`] for the real service and [`backend::StubBackend`]
//! for demos and tests.

pub mod backend;
pub mod chat;
pub mod config;
pub mod error;
pub mod risk;
pub mod store;
pub mod timer;
pub mod wizard;

pub use config::WizardConfig;
pub use error::{Error, Result};
pub use wizard::{AdvanceOutcome, WizardController, WizardStep};
