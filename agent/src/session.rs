//! Multi-round driver for the agent loop.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, instrument};

use crate::core::conversation::Conversation;
use crate::core::types::Message;
use crate::interpreter::StepInterpreter;
use crate::io::backend::{Backend, BackendClient};
use crate::io::fetch::Fetcher;
use crate::io::prompt::{AUTO_CODE, PromptEngine, SYSTEM};
use crate::io::schema::auto_steps_format;
use crate::io::transcript::save_transcript;
use crate::io::ui::Ui;

/// Reason why `run_session` stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStop {
    /// A batch contained `DONE`.
    Done,
    /// The backend returned no steps.
    EmptyBatch,
}

/// Summary of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub rounds: u32,
    pub stop: SessionStop,
}

/// What happened in one round, reported to the caller's callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub round: u32,
    pub steps: usize,
    pub messages: usize,
}

/// System prompt plus rendered instructions for a fresh session.
pub fn initial_conversation(
    prompts: &PromptEngine,
    file_paths: &[String],
    instructions: &str,
) -> Result<Conversation> {
    let system = prompts.render(&SYSTEM, json!({}))?;
    let user = prompts.render(
        &AUTO_CODE,
        json!({ "filePaths": file_paths, "instructions": instructions }),
    )?;
    Ok(Conversation::from_messages(vec![
        Message::system(system.text),
        Message::user(user.text),
    ]))
}

/// `gpt-repo-auto-<unix millis>.json` inside `dir`.
pub fn default_transcript_path(dir: &Path) -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    dir.join(format!("gpt-repo-auto-{millis}.json"))
}

/// Request batches and run them until the model is done or returns nothing.
///
/// The transcript is persisted after every change. Protocol violations and
/// persistence failures stop the session with an error.
#[instrument(skip_all, fields(model = %model, transcript = %transcript_path.display()))]
pub fn run_session<U, F, B, C>(
    ui: &U,
    client: &BackendClient<'_, B>,
    interpreter: &StepInterpreter<'_, U, F, B>,
    conversation: &mut Conversation,
    model: &str,
    transcript_path: &Path,
    mut on_round: C,
) -> Result<SessionOutcome>
where
    U: Ui + ?Sized,
    F: Fetcher + ?Sized,
    B: Backend + ?Sized,
    C: FnMut(&RoundOutcome),
{
    let format = auto_steps_format()?;
    save_transcript(transcript_path, conversation)?;

    let mut rounds = 0u32;
    loop {
        ui.log(&format!("Querying {model}..."));
        let batch = client.complete_steps(conversation.messages(), model, &format)?;
        rounds += 1;

        let assistant = serde_json::to_string(&batch).context("serialize step batch")?;
        conversation.push(Message::assistant(assistant));
        save_transcript(transcript_path, conversation)?;

        if batch.is_empty() {
            info!(rounds, "backend returned an empty batch");
            return Ok(SessionOutcome {
                rounds,
                stop: SessionStop::EmptyBatch,
            });
        }

        let outcome = interpreter.run_batch(&batch)?;
        on_round(&RoundOutcome {
            round: rounds,
            steps: batch.len(),
            messages: outcome.messages.len(),
        });
        conversation.extend(outcome.messages);
        save_transcript(transcript_path, conversation)?;

        if outcome.done {
            info!(rounds, "session done");
            return Ok(SessionOutcome {
                rounds,
                stop: SessionStop::Done,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_conversation_has_system_then_instructions() {
        let prompts = PromptEngine::new().expect("prompts");
        let conversation =
            initial_conversation(&prompts, &["src/lib.rs".to_string()], "Add docs")
                .expect("conversation");
        let messages = conversation.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, crate::core::types::Role::System);
        assert!(messages[1].content.contains("Add docs"));
        assert!(messages[1].content.contains("src/lib.rs"));
    }

    #[test]
    fn default_transcript_path_is_timestamped() {
        let path = default_transcript_path(Path::new("/work"));
        let name = path.file_name().and_then(|n| n.to_str()).expect("name");
        assert!(name.starts_with("gpt-repo-auto-"));
        assert!(name.ends_with(".json"));
        assert!(path.starts_with("/work"));
    }
}
