//! Persisting the conversation transcript between rounds.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::conversation::Conversation;

/// Write the transcript as a JSON array of messages, replacing any previous copy.
pub fn save_transcript(path: &Path, conversation: &Conversation) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create transcript dir {}", parent.display()))?;
    }
    let buf = serde_json::to_string(conversation).context("serialize transcript")?;
    let mut tmp_name = path
        .file_name()
        .with_context(|| format!("transcript path missing file name {}", path.display()))?
        .to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, buf).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    debug!(path = %path.display(), messages = conversation.len(), "saved transcript");
    Ok(())
}

/// Load a transcript previously written by [`save_transcript`].
pub fn load_transcript(path: &Path) -> Result<Conversation> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read transcript {}", path.display()))?;
    let conversation: Conversation = serde_json::from_str(&contents)
        .with_context(|| format!("parse transcript {}", path.display()))?;
    Ok(conversation)
}
