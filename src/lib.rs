#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

//! Conversation core for adaptive assistants: intent routing, bounded
//! session memory, learned preferences, and feedback-driven adaptation,
//! with generation and summarization plugged in behind traits.

pub mod config;
pub mod error;
pub mod feedback;
pub mod intent;
#[doc(hidden)]
pub mod observability;
pub mod orchestrator;
pub mod preference;
pub mod provider;
pub mod session;

pub use config::Config;
pub use error::{AttuneError, Result};
pub use orchestrator::{Orchestrator, SubmitOutcome};
