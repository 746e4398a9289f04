//! The wizard core: field store, step state machine, per-step validators, and
//! the controller that ties them to the backend collaborator.

pub mod controller;
pub mod model;
pub mod step;
pub mod validate;

pub use controller::{AdvanceOutcome, Connectivity, WizardController};
pub use model::FieldStore;
pub use step::WizardStep;
