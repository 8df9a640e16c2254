//! Restricted interpreter for the four filesystem steps.
//!
//! Used directly by the agent interpreter for fs steps and by the code
//! operation pipeline for translated batches. Every step yields exactly one
//! user message. Declines and filesystem failures are reported in that message;
//! only UI failures and protocol violations are errors.

use std::fs;
use std::io;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::policy::requires_confirmation;
use crate::core::protocol::decode_fs_step;
use crate::core::types::{FsStep, Message, StepBatch};
use crate::io::ui::{FileOperationKind, Ui, confirm};

/// Applies filesystem steps after confirming them with the user.
pub struct FsStepRunner<'a, U: Ui + ?Sized> {
    ui: &'a U,
}

impl<'a, U: Ui + ?Sized> FsStepRunner<'a, U> {
    pub fn new(ui: &'a U) -> Self {
        Self { ui }
    }

    /// Run every step of a filesystem batch in order.
    ///
    /// A step outside the filesystem family halts the batch with a protocol
    /// violation; steps before it have already been applied.
    #[instrument(skip_all, fields(steps = batch.len()))]
    pub fn run_batch(&self, batch: &StepBatch) -> Result<Vec<Message>> {
        let mut messages = Vec::with_capacity(batch.len());
        for (index, raw) in batch.steps.iter().enumerate() {
            let step = decode_fs_step(index, raw)?;
            messages.push(self.run_step(&step)?);
        }
        Ok(messages)
    }

    /// Confirm and apply one step, returning its outcome message.
    pub fn run_step(&self, step: &FsStep) -> Result<Message> {
        let (kind, path, contents) = preview(step);
        self.ui.set_file_operation(kind, path, contents);
        let outcome = self.confirm_and_apply(step);
        self.ui.close_file_operation();
        let text = outcome?;
        self.ui.log(&text);
        Ok(Message::user(text))
    }

    fn confirm_and_apply(&self, step: &FsStep) -> Result<String> {
        let text = StepText::for_step(step);
        let confirmed = !requires_confirmation(step.kind()) || confirm(self.ui, &text.question)?;
        if !confirmed {
            info!(step = step.kind().tag(), "declined");
            return Ok(text.aborted);
        }
        match apply(step) {
            Ok(()) => {
                debug!(step = step.kind().tag(), "applied");
                Ok(text.done)
            }
            Err(err) => {
                warn!(step = step.kind().tag(), err = %err, "filesystem step failed");
                Ok(format!("{}: {err}", text.failed))
            }
        }
    }
}

fn preview(step: &FsStep) -> (FileOperationKind, &str, &str) {
    match step {
        FsStep::CreateFile {
            file_path,
            file_contents,
        } => (FileOperationKind::Create, file_path.as_str(), file_contents.as_str()),
        FsStep::CreateDir { dir_path } => (FileOperationKind::CreateDir, dir_path.as_str(), ""),
        FsStep::EditFile {
            file_path,
            file_contents,
        } => (FileOperationKind::Edit, file_path.as_str(), file_contents.as_str()),
        FsStep::DeleteFile { file_path } => (FileOperationKind::Delete, file_path.as_str(), ""),
    }
}

struct StepText {
    question: String,
    done: String,
    aborted: String,
    failed: String,
}

impl StepText {
    fn for_step(step: &FsStep) -> Self {
        let (question, done, aborted, failed) = match step {
            FsStep::CreateFile { file_path, .. } => (
                format!("Do you want to create the file at {file_path}?"),
                format!("File created: {file_path}"),
                format!("File creation aborted: {file_path}"),
                format!("Failed to create file {file_path}"),
            ),
            FsStep::CreateDir { dir_path } => (
                format!("Do you want to create the directory at {dir_path}?"),
                format!("Directory created: {dir_path}"),
                format!("Directory creation aborted: {dir_path}"),
                format!("Failed to create directory {dir_path}"),
            ),
            FsStep::EditFile { file_path, .. } => (
                format!("Do you want to edit the file at {file_path}?"),
                format!("File edited: {file_path}"),
                format!("File edit aborted: {file_path}"),
                format!("Failed to edit file {file_path}"),
            ),
            FsStep::DeleteFile { file_path } => (
                format!("Do you want to delete the file at {file_path}?"),
                format!("File deleted: {file_path}"),
                format!("File deletion aborted: {file_path}"),
                format!("Failed to delete file {file_path}"),
            ),
        };
        Self {
            question,
            done,
            aborted,
            failed,
        }
    }
}

fn apply(step: &FsStep) -> io::Result<()> {
    match step {
        FsStep::CreateFile {
            file_path,
            file_contents,
        }
        | FsStep::EditFile {
            file_path,
            file_contents,
        } => fs::write(file_path, file_contents),
        FsStep::CreateDir { dir_path } => fs::create_dir_all(dir_path),
        FsStep::DeleteFile { file_path } => fs::remove_file(file_path),
    }
}
