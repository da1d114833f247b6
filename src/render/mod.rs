//! Argument rendering
//!
//! Resolves expression trees against an execution context, producing the
//! concrete JSON arguments handed to a brick. Pipeline-valued expressions
//! render to callable thunks and are never executed here.

pub mod path;
pub mod renderer;
pub mod template;

pub use path::{parse_path, walk, PathError, PathSegment};
pub use renderer::{BrickArgs, PipelineThunk, RenderOptions, RenderedArg, Renderer};

/// Argument-resolution failures.
///
/// `VariableNotDefined` is recoverable when the caller opts out of strict
/// validation; template and path errors are always fatal to the step.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("variable not defined: {path}")]
    VariableNotDefined { path: String },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("template error: {0}")]
    Template(String),

    #[error("pipeline expressions are only supported at the top level of a config entry")]
    NestedPipeline,

    #[error("invalid expression: {0}")]
    Expression(String),
}
