//! rules-eval: evaluate a rule file once against a JSON context.
//!
//! Reads the context from `--context` or stdin, runs a single evaluation
//! pass and prints the outcome as JSON:
//! - `results`: one entry per rule, in evaluation order
//! - `context`: the enriched context after all actions ran
//! - `predictions`: rules ranked for preload (learning enabled only)
//! - `optimizations` / `metrics`: when requested

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context as _};
use clap::Parser;
use serde_json::{Map, Value};
use tracing::{info, warn};

use ruleweave_core::config::load_dotenv;
use ruleweave_core::{Context, EngineConfig};
use ruleweave_rules::validation::validate_yaml;
use ruleweave_rules::{EvaluateOptions, RuleEngine};

// ── CLI ─────────────────────────────────────────────────────────────

/// Evaluate a rule file against a JSON context.
#[derive(Parser, Debug)]
#[command(name = "rules-eval", version, about)]
struct Cli {
    /// Rule file (YAML or JSON). Defaults to RULEWEAVE_RULES_FILE.
    #[arg(long, short)]
    rules: Option<PathBuf>,

    /// JSON context file. Reads stdin when omitted or "-".
    #[arg(long, short)]
    context: Option<PathBuf>,

    /// Deadline for the whole pass in milliseconds.
    #[arg(long, env = "RULES_EVAL_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Run the history optimizer after evaluating.
    #[arg(long)]
    optimize: bool,

    /// Include per-stage metrics in the output.
    #[arg(long)]
    metrics: bool,

    /// Only validate the rule file and print errors and warnings.
    #[arg(long)]
    validate: bool,

    /// Pretty-print the JSON output.
    #[arg(long, env = "RULES_EVAL_PRETTY", default_value_t = false)]
    pretty: bool,
}

fn read_context(path: Option<&PathBuf>) -> anyhow::Result<Context> {
    let raw = match path {
        Some(p) if p.as_os_str() != "-" => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read context file {}", p.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read context from stdin")?;
            buf
        }
    };
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str(&raw).context("context is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("context must be a JSON object, got {other}"),
    }
}

fn print(value: &Value, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env();
    config.log_summary();

    let Some(rules_path) = cli.rules.clone().or_else(|| config.rules_file.clone()) else {
        bail!("no rule file given (use --rules or RULEWEAVE_RULES_FILE)");
    };

    if cli.validate {
        let content = std::fs::read_to_string(&rules_path)
            .with_context(|| format!("failed to read {}", rules_path.display()))?;
        let result = validate_yaml(&content, None);
        print(&serde_json::to_value(&result)?, cli.pretty)?;
        if !result.valid {
            std::process::exit(1);
        }
        return Ok(());
    }

    let engine = RuleEngine::new(config)?;
    let count = engine
        .load_rules_from_file(&rules_path)
        .with_context(|| format!("failed to load {}", rules_path.display()))?;
    info!(path = %rules_path.display(), count, "rules loaded");

    let context = read_context(cli.context.as_ref())?;
    let options = match cli.timeout_ms {
        Some(ms) => EvaluateOptions::with_timeout(Duration::from_millis(ms)),
        None => EvaluateOptions::default(),
    };
    let evaluation = engine.evaluate_with(context, options).await;

    let failed = evaluation.results.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        warn!(failed, "some rules failed during evaluation");
    }

    let mut output = serde_json::to_value(&evaluation)?;
    if cli.optimize {
        output["optimizations"] = serde_json::to_value(engine.optimize_rules())?;
    }
    if cli.metrics {
        output["metrics"] = serde_json::to_value(engine.get_metrics())?;
    }
    print(&output, cli.pretty)
}
