//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use dossier_core::{Pipeline, ProgressReporter, Stage};
use dossier_shared::{AppConfig, PipelineOutcome, init_config, load_config};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// dossier: research a topic and write it up.
#[derive(Parser)]
#[command(
    name = "dossier",
    version,
    about = "Research a topic on the web and write the findings as DOCX and PDF reports.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Research a topic and write the report files.
    Run {
        /// Topic to research.
        topic: String,

        /// Number of search results to gather (defaults to config).
        #[arg(short = 'n', long)]
        max_results: Option<usize>,

        /// Output directory for the report files (defaults to config).
        #[arg(short, long)]
        out: Option<String>,

        /// Generation model (defaults to config).
        #[arg(short, long)]
        model: Option<String>,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,

        /// Skip every network backend, even when keys are configured.
        #[arg(long)]
        offline: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Create a default config file.
    Init,
    /// Show the resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "dossier=info",
        1 => "dossier=debug",
        _ => "dossier=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so `run --json` keeps stdout machine-readable.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            topic,
            max_results,
            out,
            model,
            json,
            offline,
        } => {
            let opts = RunOptions {
                max_results,
                out,
                model,
                json,
                offline,
                verbose: cli.verbose,
            };
            cmd_run(&topic, opts).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

struct RunOptions {
    max_results: Option<usize>,
    out: Option<String>,
    model: Option<String>,
    json: bool,
    offline: bool,
    verbose: u8,
}

async fn cmd_run(topic: &str, opts: RunOptions) -> Result<()> {
    let mut config = load_config()?;
    if let Some(out) = opts.out {
        config.defaults.output_dir = out;
    }
    if let Some(model) = opts.model {
        config.generation.default_model = model;
    }
    let max_results = opts.max_results.unwrap_or(config.defaults.max_results);

    let pipeline = if opts.offline {
        Pipeline::offline(PathBuf::from(&config.defaults.output_dir))
    } else {
        Pipeline::from_config(&config)?
    };

    info!(topic, max_results, offline = opts.offline, "running pipeline");

    let reporter = CliProgress::new();
    let (outcome, state) = pipeline.run_with_state(topic, max_results, &reporter).await;
    reporter.finish();

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if let PipelineOutcome::Completed(artifacts) = &outcome {
        println!();
        println!("  Report written.");
        if let Some(docx) = &artifacts.docx {
            println!("  DOCX:  {}", docx.display());
        }
        if let Some(pdf) = &artifacts.pdf {
            println!("  PDF:   {}", pdf.display());
        }
        println!("  Run:   {}", state.run_id);
        println!();
    }

    if opts.verbose > 0 {
        for message in &state.messages {
            eprintln!("  - {message}");
        }
    }

    match outcome {
        PipelineOutcome::Completed(_) => Ok(()),
        PipelineOutcome::Failed { error } => Err(eyre!("pipeline failed: {error}")),
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.set_length(Stage::ALL.len() as u64);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: Stage) {
        self.spinner.set_message(stage.label());
    }

    fn stage_finished(&self, _stage: Stage) {
        self.spinner.inc(1);
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
