//! CLI command definitions

use clap::Args;

/// Run a mod's pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to mod YAML file
    #[arg(short, long)]
    pub file: String,

    /// Input values (key=value; values parse as JSON, falling back to strings)
    #[arg(short, long, value_parser = parse_key_value)]
    pub input: Vec<(String, String)>,

    /// Resolve missing variables to null instead of failing
    #[arg(long)]
    pub lenient: bool,

    /// Don't persist trace records
    #[arg(long)]
    pub no_trace: bool,

    /// Print the final context as JSON
    #[arg(long)]
    pub show_context: bool,
}

/// Validate a mod file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to mod YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List registered bricks
#[derive(Debug, Args, Clone)]
pub struct BricksCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show trace history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show step records for a specific run ID
    #[arg(long)]
    pub run_id: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
