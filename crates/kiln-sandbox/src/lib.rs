//! Stages a target's declared inputs, runs its recipe, collects its
//! declared outputs.
//!
//! Grounded on `cuenv-core`'s `tasks::backend::HostBackend` (command
//! construction, environment composition, output capture) and
//! `tasks::process_registry` (terminate-on-timeout). Implements
//! `kiln-scheduler`'s [`kiln_scheduler::TargetRunner`] trait so the
//! scheduler depends only on the trait, never on this crate directly.

mod error;
mod process;
mod runner;
mod staging;

pub use error::{Error, Result};
pub use process::ProcessGuard;
pub use runner::{HostRunner, SandboxConfig};
pub use staging::{StagingMode, resolve_output_pattern, stage_inputs};
