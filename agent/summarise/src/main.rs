//! Summarise a set of files into one Markdown overview.

mod summarise;

use std::fs;
use std::path::PathBuf;

use agent::exit_codes;
use agent::io::backend::{BackendClient, OpenAiBackend};
use agent::io::cache::ResponseCache;
use agent::io::config::{AgentConfig, DEFAULT_CONFIG_FILE, load_config};
use agent::io::discovery::{DEFAULT_EXTENSIONS, collect_file_paths};
use agent::io::prompt::PromptEngine;
use agent::io::ui::{ConsoleUi, Ui};
use agent::logging;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use crate::summarise::{MAX_PROMPT_LENGTH, Summariser, SummaryModels};

#[derive(Parser, Debug)]
#[command(name = "summarise", version, about = "Summarise files with an LLM")]
struct Cli {
    /// Files or directories to summarise.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Output Markdown file.
    #[arg(long, default_value = "out.md")]
    out: PathBuf,

    /// Config file (defaults to `.repo-agent.toml` in the working directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model for per-file summaries.
    #[arg(long)]
    summary_model: Option<String>,

    /// Model for chunk and final summaries.
    #[arg(long)]
    model: Option<String>,

    /// Character limit of one chunk prompt.
    #[arg(long, default_value_t = MAX_PROMPT_LENGTH)]
    max_prompt_length: usize,

    /// Always query the backend.
    #[arg(long)]
    no_cache: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut AgentConfig) {
        if let Some(model) = &self.summary_model {
            config.summary_model = model.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if self.no_cache {
            config.cache_enabled = false;
        }
    }
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        error!(err = %format!("{err:#}"), "summarise failed");
        eprintln!("{err:#}");
        std::process::exit(exit_codes::FAILED);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = load_config(&config_path)?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let ui = ConsoleUi::stdio(true);
    let files = collect_file_paths(&cli.paths, DEFAULT_EXTENSIONS)?;
    ui.log(&format!("Summarising {} files", files.len()));

    let backend = OpenAiBackend::from_config(&config.backend)?;
    let cache = if config.cache_enabled {
        Some(ResponseCache::open(&config.cache_dir)?)
    } else {
        None
    };
    let prompts = PromptEngine::new()?;
    let summary = Summariser::new(
        &ui,
        BackendClient::new(&backend, cache.as_ref()),
        &prompts,
        SummaryModels {
            file_model: config.summary_model.clone(),
            merge_model: config.model.clone(),
        },
    )
    .with_max_prompt_length(cli.max_prompt_length)
    .summarise_deep(&files)?;

    fs::write(&cli.out, summary).with_context(|| format!("write {}", cli.out.display()))?;
    ui.log(&format!("Summary written to {}", cli.out.display()));
    Ok(())
}
