//! Verbena Plan
//!
//! This crate provides the execution-planning compiler. It takes a
//! user-authored [`GraphDef`](verbena_config::GraphDef), validates every
//! connection against the task registry, rejects cycles and unsatisfied
//! inputs, and lays the nodes out into ordered phases.
//!
//! Key properties:
//! - Compilation is all-or-nothing: the first violation is returned as a
//!   structured [`CompileError`] and no partial plan exists.
//! - Compilation is deterministic and pure: identical definitions always
//!   yield byte-identical serialized plans, and no I/O happens here.
//! - Nodes sharing a phase have no edge between them and may execute in
//!   parallel; every binding points at a strictly earlier phase.

mod compile;
mod error;
mod graph;
mod plan;

pub use compile::compile;
pub use error::{CompileError, HandleKind};
pub use plan::{ExecutionPlan, InputBinding, Phase, PlanNode};
