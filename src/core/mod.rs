//! Core domain models for the brick runtime
//!
//! This module defines the fundamental data structures that represent
//! expressions, brick invocations, execution contexts, and run state.

pub mod config;
pub mod context;
pub mod expression;
pub mod invocation;
pub mod state;

pub use config::{ModConfig, StepConfig};
pub use context::{BindingCollision, ExecutionContext};
pub use expression::{is_truthy, Expression, ExpressionParseError};
pub use invocation::{BrickInvocation, WindowTarget};
pub use state::{RunState, RunStatus};
