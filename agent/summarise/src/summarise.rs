//! Deep summarisation of a set of files.
//!
//! Every file is summarised on its own, the summaries are packed into chunks
//! that keep the combined prompt under [`MAX_PROMPT_LENGTH`], each chunk is
//! summarised, and multiple chunk summaries are merged into one.

use std::fs;
use std::path::{Path, PathBuf};

use agent::io::backend::{Backend, BackendClient};
use agent::io::prompt::{PromptEngine, SUMMARISE_FILE, SUMMARISE_META_SUMMARIES, SUMMARISE_SUMMARIES};
use agent::io::ui::Ui;
use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, instrument};

/// Upper bound, in characters, of a rendered chunk prompt.
pub const MAX_PROMPT_LENGTH: usize = 30_000;

/// Summary of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub file_path: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryModels {
    /// Per-file summaries.
    pub file_model: String,
    /// Chunk and final summaries.
    pub merge_model: String,
}

pub struct Summariser<'a, U: Ui + ?Sized, B: Backend + ?Sized> {
    ui: &'a U,
    client: BackendClient<'a, B>,
    prompts: &'a PromptEngine,
    models: SummaryModels,
    max_prompt_length: usize,
}

impl<'a, U: Ui + ?Sized, B: Backend + ?Sized> Summariser<'a, U, B> {
    pub fn new(
        ui: &'a U,
        client: BackendClient<'a, B>,
        prompts: &'a PromptEngine,
        models: SummaryModels,
    ) -> Self {
        Self {
            ui,
            client,
            prompts,
            models,
            max_prompt_length: MAX_PROMPT_LENGTH,
        }
    }

    pub fn with_max_prompt_length(mut self, max_prompt_length: usize) -> Self {
        self.max_prompt_length = max_prompt_length;
        self
    }

    /// Produce one summary covering every file in `files`.
    #[instrument(skip_all, fields(files = files.len()))]
    pub fn summarise_deep(&self, files: &[PathBuf]) -> Result<String> {
        if files.is_empty() {
            bail!("no files to summarise");
        }

        let summaries = files
            .iter()
            .map(|path| self.summarise_file(path))
            .collect::<Result<Vec<_>>>()?;

        let chunks = chunk_summaries(self.prompts, summaries, self.max_prompt_length)?;
        info!(chunks = chunks.len(), "packed file summaries");

        let mut meta_summaries = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            self.ui.log(&format!(
                "Summarising chunk {} of {} ({} files)",
                index + 1,
                chunks.len(),
                chunk.len()
            ));
            let prompt = self
                .prompts
                .render(&SUMMARISE_SUMMARIES, json!({ "summaries": chunk }))?;
            meta_summaries.push(self.client.complete_text(&prompt, &self.models.merge_model)?);
        }

        if meta_summaries.len() == 1 {
            return Ok(meta_summaries.remove(0));
        }

        self.ui.log(&format!("Merging {} summaries", meta_summaries.len()));
        let prompt = self.prompts.render(
            &SUMMARISE_META_SUMMARIES,
            json!({ "metaSummaries": meta_summaries }),
        )?;
        self.client.complete_text(&prompt, &self.models.merge_model)
    }

    fn summarise_file(&self, path: &Path) -> Result<FileSummary> {
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let file_path = path.to_string_lossy().into_owned();
        self.ui.log(&format!("Summarising {file_path}"));
        let prompt = self.prompts.render(
            &SUMMARISE_FILE,
            json!({
                "filePath": file_path,
                "fileContent": String::from_utf8_lossy(&bytes),
            }),
        )?;
        let summary = self.client.complete_text(&prompt, &self.models.file_model)?;
        Ok(FileSummary { file_path, summary })
    }
}

/// Greedily pack summaries, in order, into chunks whose rendered prompt fits `max_len`.
///
/// A summary too large for any chunk gets a chunk of its own. No chunk is empty.
pub fn chunk_summaries(
    prompts: &PromptEngine,
    summaries: Vec<FileSummary>,
    max_len: usize,
) -> Result<Vec<Vec<FileSummary>>> {
    let mut chunks = Vec::new();
    let mut current: Vec<FileSummary> = Vec::new();

    for summary in summaries {
        current.push(summary);
        let rendered = prompts.render(&SUMMARISE_SUMMARIES, json!({ "summaries": current }))?;
        let len = rendered.text.chars().count();
        if len > max_len && current.len() > 1 {
            let overflow = current.pop();
            debug!(len, files = current.len(), "closing chunk");
            chunks.push(std::mem::take(&mut current));
            current.extend(overflow);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    Ok(chunks)
}
