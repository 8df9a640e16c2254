//! Step interpreter: runs one agent batch against the filesystem, shell,
//! network and user.
//!
//! Steps run strictly in order. Each is decoded only when reached, so an
//! unknown tag halts the batch with a [`ProtocolViolation`] after earlier steps
//! have taken effect. Declines and external failures become messages.
//!
//! [`ProtocolViolation`]: crate::core::protocol::ProtocolViolation

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::code_operation::CodeOperationPipeline;
use crate::core::policy::requires_confirmation;
use crate::core::protocol::decode_auto_step;
use crate::core::types::{AutoStep, FsStep, Message, StepBatch, StepKind};
use crate::fs_steps::FsStepRunner;
use crate::io::backend::Backend;
use crate::io::config::AgentConfig;
use crate::io::fetch::{Fetcher, html_to_text, search_url};
use crate::io::shell::{run_command_with_timeout, shell_command};
use crate::io::ui::{Ui, confirm};

/// Limits and endpoints for the external steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterSettings {
    pub shell_timeout: Duration,
    pub shell_output_limit_bytes: usize,
    pub http_text_width: usize,
    pub search_url: String,
}

impl InterpreterSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            shell_timeout: config.shell_timeout(),
            shell_output_limit_bytes: config.shell_output_limit_bytes,
            http_text_width: config.http_text_width,
            search_url: config.search_url.clone(),
        }
    }
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

/// Result of running one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Response messages in step order.
    pub messages: Vec<Message>,
    /// A `DONE` step was executed.
    pub done: bool,
}

pub struct StepInterpreter<'a, U: Ui + ?Sized, F: Fetcher + ?Sized, B: Backend + ?Sized> {
    ui: &'a U,
    fetcher: &'a F,
    pipeline: CodeOperationPipeline<'a, U, B>,
    settings: InterpreterSettings,
}

impl<'a, U, F, B> StepInterpreter<'a, U, F, B>
where
    U: Ui + ?Sized,
    F: Fetcher + ?Sized,
    B: Backend + ?Sized,
{
    pub fn new(
        ui: &'a U,
        fetcher: &'a F,
        pipeline: CodeOperationPipeline<'a, U, B>,
        settings: InterpreterSettings,
    ) -> Self {
        Self {
            ui,
            fetcher,
            pipeline,
            settings,
        }
    }

    /// Run every step of `batch` in order.
    #[instrument(skip_all, fields(steps = batch.len()))]
    pub fn run_batch(&self, batch: &StepBatch) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for (index, raw) in batch.steps.iter().enumerate() {
            let step = decode_auto_step(index, raw).inspect_err(|err| {
                error!(index, err = %err, "halting batch");
            })?;
            info!(index, step = step.kind().tag(), "running step");
            self.run_step(step, &mut outcome)?;
        }
        Ok(outcome)
    }

    fn run_step(&self, step: AutoStep, outcome: &mut BatchOutcome) -> Result<()> {
        let message = match step {
            AutoStep::CreateFile {
                file_path,
                file_contents,
            } => self.fs_step(&FsStep::CreateFile {
                file_path,
                file_contents,
            })?,
            AutoStep::CreateDir { dir_path } => self.fs_step(&FsStep::CreateDir { dir_path })?,
            AutoStep::EditFile {
                file_path,
                file_contents,
            } => self.fs_step(&FsStep::EditFile {
                file_path,
                file_contents,
            })?,
            AutoStep::DeleteFile { file_path } => {
                self.fs_step(&FsStep::DeleteFile { file_path })?
            }
            AutoStep::RequestFile { file_path } => self.request_file(&file_path),
            AutoStep::QueryUser { message } => self.query_user(&message)?,
            AutoStep::RunShell { cwd, command } => self.run_shell(&cwd, &command)?,
            AutoStep::GoogleSearch { query } => self.google_search(&query)?,
            AutoStep::HttpRequestGet { url } => self.http_get(&url)?,
            AutoStep::CodeOperation {
                related_files,
                output_files,
                prompt,
            } => {
                let messages = self.pipeline.run(&related_files, &output_files, &prompt)?;
                outcome.messages.extend(messages);
                return Ok(());
            }
            AutoStep::Done => {
                self.ui.log("All steps completed.");
                outcome.done = true;
                return Ok(());
            }
        };
        outcome.messages.push(message);
        Ok(())
    }

    fn fs_step(&self, step: &FsStep) -> Result<Message> {
        FsStepRunner::new(self.ui).run_step(step)
    }

    fn request_file(&self, file_path: &str) -> Message {
        match fs::read(file_path) {
            Ok(bytes) => {
                let file_content = String::from_utf8_lossy(&bytes);
                self.ui.log(&format!("File requested: {file_path}"));
                Message::user(
                    json!({ "filePath": file_path, "fileContent": file_content }).to_string(),
                )
            }
            Err(err) => {
                warn!(file_path, err = %err, "requested file unreadable");
                let text = format!("Failed to read file {file_path}: {err}");
                self.ui.log(&text);
                Message::user(text)
            }
        }
    }

    fn query_user(&self, message: &str) -> Result<Message> {
        let answer = self.ui.prompt_user("Query", message)?;
        Ok(Message::user(answer.unwrap_or_default()))
    }

    fn run_shell(&self, cwd: &str, command: &str) -> Result<Message> {
        if !self.confirmed(
            StepKind::RunShell,
            &format!("Do you want to run `{command}` in {cwd}?"),
        )? {
            return Ok(self.aborted(format!("Shell command aborted: {command}")));
        }

        self.ui.log(&format!("Running `{command}` in {cwd}"));
        let report = match run_command_with_timeout(
            shell_command(command, Path::new(cwd)),
            self.settings.shell_timeout,
            self.settings.shell_output_limit_bytes,
        ) {
            Ok(output) => json!({
                "command": command,
                "cwd": cwd,
                "exitCode": output.status.code(),
                "success": output.status.success() && !output.timed_out,
                "timedOut": output.timed_out,
                "stdout": output.stdout_text(),
                "stderr": output.stderr_text(),
            }),
            Err(err) => {
                warn!(command, cwd, err = %err, "shell command failed to run");
                json!({
                    "command": command,
                    "cwd": cwd,
                    "success": false,
                    "error": format!("{err:#}"),
                })
            }
        };
        Ok(Message::user(report.to_string()))
    }

    fn google_search(&self, query: &str) -> Result<Message> {
        if !self.confirmed(
            StepKind::GoogleSearch,
            &format!("Do you want to search Google for \"{query}\"?"),
        )? {
            return Ok(self.aborted(format!("Google search aborted: {query}")));
        }
        let url = search_url(&self.settings.search_url, query);
        Ok(Message::user(self.fetch_text(&url)))
    }

    fn http_get(&self, url: &str) -> Result<Message> {
        if !self.confirmed(
            StepKind::HttpRequestGet,
            &format!("Do you want to make an HTTP GET request to {url}?"),
        )? {
            return Ok(self.aborted(format!("HTTP request aborted: {url}")));
        }
        Ok(Message::user(self.fetch_text(url)))
    }

    fn fetch_text(&self, url: &str) -> String {
        self.ui.log(&format!("GET {url}"));
        let page = match self.fetcher.get(url) {
            Ok(page) => page,
            Err(err) => {
                warn!(url, err = %err, "http request failed");
                return format!("HTTP GET {url} failed: {err:#}");
            }
        };
        let text = match html_to_text(&page.body, self.settings.http_text_width) {
            Ok(text) => text,
            Err(err) => return format!("HTTP GET {url} returned unreadable content: {err:#}"),
        };
        if page.is_success() {
            text
        } else {
            format!("HTTP GET {url} returned status {}\n\n{text}", page.status)
        }
    }

    fn confirmed(&self, kind: StepKind, question: &str) -> Result<bool> {
        if !requires_confirmation(kind) {
            return Ok(true);
        }
        confirm(self.ui, question)
    }

    fn aborted(&self, text: String) -> Message {
        info!("{text}");
        self.ui.log(&text);
        Message::user(text)
    }
}
