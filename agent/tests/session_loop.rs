//! Multi-round sessions against a scripted backend.

use std::fs;

use agent::code_operation::{CodeModels, CodeOperationPipeline};
use agent::core::conversation::Conversation;
use agent::core::protocol::ProtocolViolation;
use agent::core::types::{Message, Role};
use agent::interpreter::{InterpreterSettings, StepInterpreter};
use agent::io::backend::BackendClient;
use agent::io::cache::ResponseCache;
use agent::io::prompt::PromptEngine;
use agent::io::transcript::load_transcript;
use agent::session::{RoundOutcome, SessionOutcome, SessionStop, initial_conversation, run_session};
use agent::test_support::{FakeFetcher, ScriptedBackend, ScriptedUi};
use anyhow::Result;
use serde_json::json;

struct Run {
    outcome: Result<SessionOutcome>,
    rounds: Vec<RoundOutcome>,
}

fn run(
    ui: &ScriptedUi,
    backend: &ScriptedBackend,
    cache: Option<&ResponseCache>,
    conversation: &mut Conversation,
    transcript: &std::path::Path,
) -> Run {
    let fetcher = FakeFetcher::new();
    let prompts = PromptEngine::new().expect("prompts");
    let pipeline = CodeOperationPipeline::new(
        ui,
        BackendClient::new(backend, cache),
        &prompts,
        CodeModels {
            model: "gpt-4o".to_string(),
            code_model: "o1-preview".to_string(),
        },
    )
    .expect("pipeline");
    let interpreter = StepInterpreter::new(ui, &fetcher, pipeline, InterpreterSettings::default());
    let mut rounds = Vec::new();
    let outcome = run_session(
        ui,
        &BackendClient::new(backend, cache),
        &interpreter,
        conversation,
        "gpt-4o",
        transcript,
        |round| rounds.push(round.clone()),
    );
    Run { outcome, rounds }
}

fn fresh_conversation() -> Conversation {
    let prompts = PromptEngine::new().expect("prompts");
    initial_conversation(&prompts, &["src/lib.rs".to_string()], "Write a README").expect("init")
}

#[test]
fn session_runs_until_done_and_persists_transcript() {
    let temp = tempfile::tempdir().expect("tempdir");
    let readme = temp.path().join("README.md");
    let transcript = temp.path().join("messages.json");
    let backend = ScriptedBackend::new([
        json!({ "steps": [{ "type": "QUERY_USER", "message": "Title?" }] }).to_string(),
        json!({ "steps": [
            { "type": "CREATE_FILE", "filePath": readme.to_string_lossy(), "fileContents": "# Agent" },
            { "type": "DONE" }
        ]})
        .to_string(),
    ]);
    let ui = ScriptedUi::new(["Agent", "yes"]);
    let mut conversation = fresh_conversation();

    let result = run(&ui, &backend, None, &mut conversation, &transcript);

    assert_eq!(
        result.outcome.expect("session"),
        SessionOutcome {
            rounds: 2,
            stop: SessionStop::Done
        }
    );
    assert_eq!(result.rounds.len(), 2);
    assert_eq!(fs::read_to_string(&readme).expect("read"), "# Agent");

    let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::System,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::User,
        ]
    );
    assert_eq!(conversation.messages()[3], Message::user("Agent"));
    assert_eq!(load_transcript(&transcript).expect("load"), conversation);

    let second_request = &backend.requests()[1];
    assert_eq!(second_request.messages.len(), 4);
    assert_eq!(second_request.model, "gpt-4o");
}

#[test]
fn empty_batch_stops_session() {
    let temp = tempfile::tempdir().expect("tempdir");
    let transcript = temp.path().join("messages.json");
    let backend = ScriptedBackend::new([r#"{"steps":[]}"#]);
    let ui = ScriptedUi::yes_to_all();
    let mut conversation = fresh_conversation();

    let result = run(&ui, &backend, None, &mut conversation, &transcript);

    assert_eq!(
        result.outcome.expect("session").stop,
        SessionStop::EmptyBatch
    );
    assert!(result.rounds.is_empty());
    assert_eq!(
        conversation.last(),
        Some(&Message::assistant(r#"{"steps":[]}"#))
    );
}

#[test]
fn protocol_violation_ends_session_after_saving_batch() {
    let temp = tempfile::tempdir().expect("tempdir");
    let transcript = temp.path().join("messages.json");
    let backend = ScriptedBackend::new([r#"{"steps":[{"type":"FLY_TO_MOON"}]}"#]);
    let ui = ScriptedUi::yes_to_all();
    let mut conversation = fresh_conversation();

    let result = run(&ui, &backend, None, &mut conversation, &transcript);

    let err = result.outcome.unwrap_err();
    assert!(err.downcast_ref::<ProtocolViolation>().is_some());
    let saved = load_transcript(&transcript).expect("load");
    assert_eq!(saved.len(), 3);
}

#[test]
fn cached_session_replays_without_backend() {
    let temp = tempfile::tempdir().expect("tempdir");
    let cache = ResponseCache::open(temp.path().join("cache")).expect("cache");
    let batch = json!({ "steps": [{ "type": "DONE" }] }).to_string();

    let first_backend = ScriptedBackend::new([batch.as_str()]);
    let mut first = fresh_conversation();
    run(
        &ScriptedUi::yes_to_all(),
        &first_backend,
        Some(&cache),
        &mut first,
        &temp.path().join("first.json"),
    )
    .outcome
    .expect("first session");

    let second_backend = ScriptedBackend::new(Vec::<String>::new());
    let mut second = fresh_conversation();
    run(
        &ScriptedUi::yes_to_all(),
        &second_backend,
        Some(&cache),
        &mut second,
        &temp.path().join("second.json"),
    )
    .outcome
    .expect("second session");

    assert_eq!(first_backend.requests().len(), 1);
    assert!(second_backend.requests().is_empty());
    assert_eq!(first, second);

    let entries: Vec<String> = fs::read_dir(cache.dir())
        .expect("read cache")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().any(|name| name.ends_with(".query")));
    assert!(entries.iter().any(|name| name.ends_with(".response")));
}

#[test]
fn different_instructions_miss_the_cache() {
    let temp = tempfile::tempdir().expect("tempdir");
    let cache = ResponseCache::open(temp.path().join("cache")).expect("cache");
    let prompts = PromptEngine::new().expect("prompts");
    let backend = ScriptedBackend::new([r#"{"steps":[]}"#, r#"{"steps":[]}"#]);

    for instructions in ["Write a README", "Delete the README"] {
        let mut conversation =
            initial_conversation(&prompts, &[], instructions).expect("conversation");
        run(
            &ScriptedUi::yes_to_all(),
            &backend,
            Some(&cache),
            &mut conversation,
            &temp.path().join("messages.json"),
        )
        .outcome
        .expect("session");
    }

    assert_eq!(backend.requests().len(), 2);
    assert_eq!(backend.remaining(), 0);
}
