// src/engine/mod.rs

//! Per-invocation orchestration.
//!
//! - [`plan`] is the pure core: evaluated state in, ordered steps out.
//! - [`invocation`] is the IO shell that loads each run, asks the planner
//!   what to do and drives the collaborators.
//!
//! Nothing survives between invocations; every run is re-derived from the
//! filesystem, its transfer log and the status store.

pub mod invocation;
pub mod plan;

pub use invocation::{Collaborators, Invocation, InvocationSummary, RunOutcome, StatusLine};
pub use plan::{plan, Mode, Step};
