//! Verbena Task
//!
//! Task contracts and the task registry. A contract declares the shape of
//! a task type (inputs, outputs, credit cost, whether it may start a
//! graph); the registry maps task types to their contract plus the
//! behavior that actually executes them. The engine is agnostic to what a
//! task does; it only enforces the contract shape and the bookkeeping
//! around it.

mod behavior;
mod contract;
mod error;
mod registry;

pub use behavior::{TaskBehavior, TaskInvocation, TaskOutputs};
pub use contract::{InputSpec, OutputSpec, TaskContract, ValueType};
pub use error::{RegistryError, TaskError};
pub use registry::{RegisteredTask, TaskRegistry};
