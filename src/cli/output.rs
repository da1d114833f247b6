//! CLI output formatting

use crate::core::RunStatus;
use crate::execution::ExecutionEvent;
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Completed => style("COMPLETED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
        RunStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted { run_id, total_steps } => format!(
            "{} Starting run {} ({} steps)",
            ROCKET,
            style(&run_id.to_string()[..8]).dim(),
            style(total_steps).cyan()
        ),
        ExecutionEvent::StepStarted {
            step_index,
            brick_id,
            label,
            ..
        } => {
            let name = label.as_deref().unwrap_or(brick_id);
            format!(
                "{} [{}] {}",
                SPINNER,
                style(step_index + 1).dim(),
                style(name).cyan()
            )
        }
        ExecutionEvent::StepSkipped {
            step_index,
            brick_id,
            ..
        } => format!(
            "{} [{}] {} (condition falsy)",
            SKIP,
            style(step_index + 1).dim(),
            style(brick_id).dim()
        ),
        ExecutionEvent::StepCompleted {
            step_index,
            brick_id,
            ..
        } => format!(
            "{} [{}] {}",
            CHECK,
            style(step_index + 1).dim(),
            style(brick_id).green()
        ),
        ExecutionEvent::RunCompleted { run_id } => format!(
            "{} Run ({}) completed {}",
            INFO,
            style(&run_id.to_string()[..8]).dim(),
            style("successfully").green()
        ),
        ExecutionEvent::RunFailed { run_id, error } => format!(
            "{} Run ({}) {}: {}",
            CROSS,
            style(&run_id.to_string()[..8]).dim(),
            style("failed").red(),
            style(error).dim()
        ),
        ExecutionEvent::RunCancelled { run_id } => format!(
            "{} Run ({}) {}",
            WARN,
            style(&run_id.to_string()[..8]).dim(),
            style("cancelled").yellow()
        ),
    }
}

/// Format a run summary line for history listings
#[cfg(feature = "sqlite")]
pub fn format_run_summary(summary: &crate::trace::RunSummary) -> String {
    let icon = if summary.failures > 0 { CROSS } else { CHECK };
    format!(
        "{} {} - {} steps, {} failed - {}",
        icon,
        style(&summary.run_id.to_string()[..8]).dim(),
        style(summary.steps).cyan(),
        if summary.failures > 0 {
            style(summary.failures).red().to_string()
        } else {
            style(0).dim().to_string()
        },
        style(summary.started_at.to_rfc3339()).dim()
    )
}

/// Format a JSON value compactly for console display
pub fn format_output(value: &serde_json::Value, max_chars: usize) -> String {
    let text = match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.len() <= max_chars {
        text
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}{}", cut, style("... [truncated]").dim())
    }
}
