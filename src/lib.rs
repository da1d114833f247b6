//! Brick pipeline runtime
//!
//! Mods declare ordered pipelines of bricks; this crate renders their
//! config expressions against a copy-on-write context, executes them
//! sequentially against a pluggable platform, and traces every step.

pub mod cli;
pub mod core;
pub mod execution;
pub mod messenger;
pub mod platform;
pub mod registry;
pub mod render;
pub mod trace;

pub use crate::core::{
    BrickInvocation, ExecutionContext, Expression, ModConfig, RunState, RunStatus,
};
pub use execution::{
    AbortHandle, AbortSignal, ExecutionEvent, PipelineError, PipelineOutput, PipelineRunner,
};
pub use platform::{LocalPlatform, PlatformCapability, PlatformError, PlatformProtocol};
pub use registry::{builtin_registry, Brick, BrickError, BrickOptions, BrickRegistry};
pub use render::{BrickArgs, RenderError, Renderer};
pub use trace::{InMemoryTraceRecorder, NullTraceRecorder, TraceRecorder};
