//! Two-phase code operation: free-text synthesis, then translation into
//! filesystem steps that run through the restricted interpreter.

use std::fs;
use std::io;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::core::types::{Message, StepKind};
use crate::fs_steps::FsStepRunner;
use crate::io::backend::{Backend, BackendClient, ResponseFormat};
use crate::io::prompt::{CODE_SYNTHESIS, CODE_TRANSLATION, PromptEngine};
use crate::io::schema::fs_steps_format;
use crate::io::ui::Ui;

/// Models used by the two phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeModels {
    /// Structured translation model.
    pub model: String,
    /// Free-text synthesis model.
    pub code_model: String,
}

pub struct CodeOperationPipeline<'a, U: Ui + ?Sized, B: Backend + ?Sized> {
    ui: &'a U,
    client: BackendClient<'a, B>,
    prompts: &'a PromptEngine,
    models: CodeModels,
    fs_format: ResponseFormat,
}

impl<'a, U: Ui + ?Sized, B: Backend + ?Sized> CodeOperationPipeline<'a, U, B> {
    pub fn new(
        ui: &'a U,
        client: BackendClient<'a, B>,
        prompts: &'a PromptEngine,
        models: CodeModels,
    ) -> Result<Self> {
        Ok(Self {
            ui,
            client,
            prompts,
            models,
            fs_format: fs_steps_format()?,
        })
    }

    /// Run one `CODE_OPERATION`.
    ///
    /// Returns a summary message followed by one message per translated step.
    #[instrument(skip_all, fields(related = related_files.len(), outputs = output_files.len()))]
    pub fn run(
        &self,
        related_files: &[String],
        output_files: &[String],
        prompt: &str,
    ) -> Result<Vec<Message>> {
        let input_files = input_paths(related_files, output_files)
            .into_iter()
            .map(|path| -> Result<Value> {
                let content = read_input(path)?;
                Ok(json!({ "filePath": path, "fileContent": content }))
            })
            .collect::<Result<Vec<Value>>>()?;
        let operation = StepKind::CodeOperation.tag();

        self.ui.log(&format!(
            "Synthesising code for {} with {}",
            output_files.join(", "),
            self.models.code_model
        ));
        let synthesis_prompt = self.prompts.render(
            &CODE_SYNTHESIS,
            json!({
                "operation": operation,
                "inputFiles": input_files,
                "outputFiles": output_files,
                "prompt": prompt,
            }),
        )?;
        let synthesis = self
            .client
            .complete_text(&synthesis_prompt, &self.models.code_model)?;
        debug!(len = synthesis.len(), "synthesis complete");

        let translation_prompt = self.prompts.render(
            &CODE_TRANSLATION,
            json!({
                "operation": operation,
                "referencePaths": output_files,
                "inputFiles": input_files,
                "prompt": prompt,
                "synthesis": synthesis,
            }),
        )?;
        let batch = self.client.complete_steps(
            &[Message::user(translation_prompt.text)],
            &self.models.model,
            &self.fs_format,
        )?;
        info!(steps = batch.len(), "translated code operation");

        let nested = FsStepRunner::new(self.ui).run_batch(&batch)?;
        let mut messages = Vec::with_capacity(nested.len() + 1);
        messages.push(Message::user(format!(
            "Code operation on {} produced {} file steps",
            output_files.join(", "),
            batch.len()
        )));
        messages.extend(nested);
        Ok(messages)
    }
}

/// Related files followed by output files, first occurrence wins.
fn input_paths<'p>(related_files: &'p [String], output_files: &'p [String]) -> Vec<&'p str> {
    let mut paths: Vec<&str> = Vec::new();
    for path in related_files.iter().chain(output_files) {
        if !paths.contains(&path.as_str()) {
            paths.push(path);
        }
    }
    paths
}

/// Contents of an input file, decoded lossily. A missing file reads as empty.
fn read_input(path: &str) -> Result<String> {
    match fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path, "input file missing, using empty content");
            Ok(String::new())
        }
        Err(err) => Err(err).with_context(|| format!("read input file {path}")),
    }
}
