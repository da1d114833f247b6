//! Pipeline execution

pub mod abort;
pub mod engine;
pub mod executor;

pub use abort::{AbortHandle, AbortSignal};
pub use engine::{ExecutionEvent, PipelineOutput, PipelineRunner};
pub use executor::{StepExecutor, StepOutcome};

use crate::core::BindingCollision;
use crate::registry::BrickError;
use crate::render::RenderError;

/// Run-level failures
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("brick '{id}' is not registered")]
    BrickNotFound { id: String },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("step '{step}' failed: {source}")]
    Brick {
        step: String,
        #[source]
        source: BrickError,
    },

    #[error(transparent)]
    OutputKeyCollision(#[from] BindingCollision),

    #[error("run cancelled")]
    Cancelled,
}
