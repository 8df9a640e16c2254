//! Interactive repository agent.
//!
//! Expands the given paths into a file list, asks for instructions and runs the
//! step loop against an OpenAI-compatible backend until the model is done.

use std::path::{Path, PathBuf};

use agent::code_operation::{CodeModels, CodeOperationPipeline};
use agent::core::protocol::ProtocolViolation;
use agent::exit_codes;
use agent::interpreter::{InterpreterSettings, StepInterpreter};
use agent::io::backend::{BackendClient, OpenAiBackend};
use agent::io::cache::ResponseCache;
use agent::io::config::{AgentConfig, DEFAULT_CONFIG_FILE, load_config};
use agent::io::discovery::{DEFAULT_EXTENSIONS, collect_file_paths};
use agent::io::fetch::HttpFetcher;
use agent::io::prompt::PromptEngine;
use agent::io::transcript::load_transcript;
use agent::io::ui::{ConsoleUi, Ui};
use agent::logging;
use agent::session::{SessionStop, default_transcript_path, initial_conversation, run_session};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

#[derive(Parser, Debug)]
#[command(
    name = "repo-agent",
    version,
    about = "Interactive agent loop over a repository"
)]
struct Cli {
    /// Files or directories the agent may work with.
    paths: Vec<PathBuf>,

    /// Config file (defaults to `.repo-agent.toml` in the working directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip every confirmation prompt.
    #[arg(short, long)]
    yes: bool,

    /// Model producing step batches.
    #[arg(long)]
    model: Option<String>,

    /// Model used for code synthesis.
    #[arg(long)]
    code_model: Option<String>,

    /// Response cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Always query the backend.
    #[arg(long)]
    no_cache: bool,

    /// Where to save the transcript after every round.
    #[arg(long)]
    messages: Option<PathBuf>,

    /// Continue from a saved transcript instead of asking for instructions.
    #[arg(long)]
    resume: Option<PathBuf>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut AgentConfig) {
        if self.yes {
            config.yes_to_all = true;
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(code_model) = &self.code_model {
            config.code_model = code_model.clone();
        }
        if let Some(cache_dir) = &self.cache_dir {
            config.cache_dir = cache_dir.clone();
        }
        if self.no_cache {
            config.cache_enabled = false;
        }
    }
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        error!(err = %format!("{err:#}"), "agent failed");
        eprintln!("{err:#}");
        let code = if err.downcast_ref::<ProtocolViolation>().is_some() {
            exit_codes::PROTOCOL_VIOLATION
        } else {
            exit_codes::FAILED
        };
        std::process::exit(code);
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

    let cwd = std::env::current_dir().context("resolve working directory")?;
    let ui = ConsoleUi::stdio(config.yes_to_all);
    ui.log("Started");

    let files = collect_file_paths(&cli.paths, DEFAULT_EXTENSIONS)?;
    ui.log(&format!("Operating on {} files", files.len()));

    let transcript_path = cli
        .messages
        .clone()
        .unwrap_or_else(|| default_transcript_path(&cwd));
    ui.log(&format!("Saving messages to {}", transcript_path.display()));

    let prompts = PromptEngine::new()?;
    let mut conversation = match &cli.resume {
        Some(path) => {
            ui.log(&format!("Resuming from {}", path.display()));
            load_transcript(path)?
        }
        None => {
            let instructions = ui
                .prompt_user("Instructions", "Please enter your instructions:")?
                .unwrap_or_default();
            let file_paths: Vec<String> = files
                .iter()
                .map(|path| display_path(path, &cwd))
                .collect();
            for path in &file_paths {
                ui.log(path);
            }
            initial_conversation(&prompts, &file_paths, &instructions)?
        }
    };

    let backend = OpenAiBackend::from_config(&config.backend)?;
    let cache = if config.cache_enabled {
        Some(ResponseCache::open(&config.cache_dir)?)
    } else {
        None
    };
    let fetcher = HttpFetcher::new(config.http_timeout())?;
    let pipeline = CodeOperationPipeline::new(
        &ui,
        BackendClient::new(&backend, cache.as_ref()),
        &prompts,
        CodeModels {
            model: config.model.clone(),
            code_model: config.code_model.clone(),
        },
    )?;
    let interpreter = StepInterpreter::new(
        &ui,
        &fetcher,
        pipeline,
        InterpreterSettings::from_config(&config),
    );

    let outcome = run_session(
        &ui,
        &BackendClient::new(&backend, cache.as_ref()),
        &interpreter,
        &mut conversation,
        &config.model,
        &transcript_path,
        |round| {
            ui.log(&format!(
                "Round {}: {} steps, {} responses",
                round.round, round.steps, round.messages
            ));
        },
    )?;

    let reason = match outcome.stop {
        SessionStop::Done => "done",
        SessionStop::EmptyBatch => "no further steps",
    };
    ui.log(&format!(
        "Finished after {} rounds ({reason})",
        outcome.rounds
    ));
    Ok(())
}

fn display_path(path: &Path, cwd: &Path) -> String {
    path.strip_prefix(cwd)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
