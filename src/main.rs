use anyhow::{Context, Result};
use brickrun::cli::commands::{BricksCommand, HistoryCommand, RunCommand, ValidateCommand};
use brickrun::cli::output::*;
use brickrun::cli::{Cli, Command};
use brickrun::core::ModConfig;
use brickrun::execution::{AbortHandle, PipelineRunner};
use brickrun::platform::LocalPlatform;
use brickrun::registry::builtin_registry;
use brickrun::render::{RenderOptions, Renderer};
use brickrun::trace::{NullTraceRecorder, TraceRecorder};
use std::sync::Arc;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_mod(cmd).await?,
        Command::Validate(cmd) => validate_mod(cmd)?,
        Command::Bricks(cmd) => list_bricks(cmd)?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

async fn run_mod(cmd: &RunCommand) -> Result<()> {
    let config = ModConfig::from_file(&cmd.file).context("Failed to load mod file")?;

    println!("{} Loaded mod: {}", INFO, style(&config.name).bold());

    let steps = config.to_steps()?;
    let ctx = config.initial_context(&cmd.input)?;
    for (key, value) in &cmd.input {
        println!(
            "{} Input: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    let recorder = build_recorder(cmd.no_trace).await?;
    let renderer = Renderer::new(RenderOptions {
        validate: !cmd.lenient,
    });

    let runner = Arc::new(
        PipelineRunner::with_renderer(
            Arc::new(builtin_registry()),
            Arc::new(LocalPlatform::new()),
            recorder,
            renderer,
        )
        .on_event(|event| println!("{}", format_execution_event(event))),
    );

    // Ctrl-C cancels the run between steps
    let (handle, signal) = AbortHandle::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.abort();
        }
    });

    println!();
    match runner.run(&steps, ctx, signal).await {
        Ok(output) => {
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&config.name).bold(),
                style("successfully").green()
            );
            println!("{} Output: {}", INFO, format_output(&output.last_output, 500));
            if cmd.show_context {
                let snapshot = output.context.redacted_snapshot();
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            Ok(())
        }
        Err(err) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&config.name).bold(),
                style("failed").red()
            );
            error!("{}", err);
            std::process::exit(1);
        }
    }
}

async fn build_recorder(no_trace: bool) -> Result<Arc<dyn TraceRecorder>> {
    if no_trace {
        return Ok(Arc::new(NullTraceRecorder));
    }

    #[cfg(feature = "sqlite")]
    {
        Ok(Arc::new(
            brickrun::trace::SqliteTraceStore::with_default_path().await?,
        ))
    }
    #[cfg(not(feature = "sqlite"))]
    {
        Ok(Arc::new(brickrun::trace::InMemoryTraceRecorder::new()))
    }
}

fn validate_mod(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating mod file...", INFO);

    let result = ModConfig::from_file(&cmd.file).and_then(|config| {
        // Steps must parse into invocations, and every brick must exist
        let steps = config.to_steps()?;
        let registry = builtin_registry();
        for step in &steps {
            if !registry.contains(&step.id) {
                anyhow::bail!("unknown brick '{}'", step.id);
            }
        }
        Ok(config)
    });

    match result {
        Ok(config) => {
            println!("{} Mod file is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Steps: {}", style(config.steps.len()).cyan());
            println!("  Options: {}", style(config.options.len()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

fn list_bricks(cmd: &BricksCommand) -> Result<()> {
    let registry = builtin_registry();
    let ids = registry.ids();

    if cmd.json {
        let bricks: Vec<serde_json::Value> = ids
            .iter()
            .filter_map(|id| registry.lookup(id).ok())
            .map(|brick| {
                serde_json::json!({
                    "id": brick.id(),
                    "description": brick.description(),
                    "default_output_key": brick.default_output_key(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&bricks)?);
        return Ok(());
    }

    println!("{} Registered bricks:", INFO);
    for id in &ids {
        if let Ok(brick) = registry.lookup(id) {
            println!(
                "  {} - {}",
                style(id).bold(),
                style(brick.description()).dim()
            );
        }
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    use brickrun::trace::SqliteTraceStore;

    let store = SqliteTraceStore::with_default_path().await?;

    if let Some(run_id_str) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id_str).context("Invalid run ID format")?;
        let records = store.records_for_run(run_id).await?;

        if records.is_empty() {
            println!("{} No records for run {}", WARN, run_id);
            return Ok(());
        }

        if cmd.json {
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else {
            println!("{} Steps for run {}:", INFO, style(run_id).cyan());
            for record in &records {
                let outcome = record
                    .outcome
                    .as_ref()
                    .map(|o| format!("{:?}", o))
                    .unwrap_or_else(|| "open".to_string());
                println!(
                    "  [{}] {} - {}",
                    style(record.step_index + 1).dim(),
                    style(&record.brick_id).bold(),
                    style(outcome).dim()
                );
            }
        }
        return Ok(());
    }

    let runs = store.list_runs(cmd.limit).await?;
    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (latest {}):", INFO, cmd.limit);
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
async fn show_history(_cmd: &HistoryCommand) -> Result<()> {
    println!(
        "{} History requires the 'sqlite' feature",
        style("error:").red()
    );
    std::process::exit(1);
}
