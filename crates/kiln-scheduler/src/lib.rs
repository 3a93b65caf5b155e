//! Lowers linked targets to job chains and runs them.
//!
//! Three concerns, grounded separately:
//! - [`plan`]: deps-scheduled -> cache-warm -> run, one [`kiln_dag::Dag`]
//!   level at a time, on `cuenv-core`'s `tasks::executor::execute_graph`
//!   fill-then-drain-per-level pattern.
//! - [`gen_pass`]: the generation-pass fixed point, on `heph`'s
//!   `engine/gen_run.go` `ScheduleGenPass`/`ScheduleGeneratedPipeline`
//!   alternation.
//! - [`traits`]: [`TargetRunner`]/[`GenRunner`], on `cuenv-core`'s
//!   `tasks::backend::TaskBackend` trait -- the scheduler depends only on
//!   these, never on a concrete sandbox.

mod error;
mod gen_pass;
mod plan;
mod scheduler;
mod traits;

pub use error::{Error, Result};
pub use gen_pass::run_gen_pass;
pub use plan::{RunLedger, run_plan, run_targets};
pub use scheduler::Scheduler;
pub use traits::{GenRunner, RunContext, RunOutcome, TargetRunner};
