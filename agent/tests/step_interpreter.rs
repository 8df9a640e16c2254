//! Behaviour of one agent batch driven through the public API.
//!
//! Uses scripted UI, backend and fetcher; filesystem effects land in temp dirs.

use std::fs;
use std::path::Path;

use agent::code_operation::{CodeModels, CodeOperationPipeline};
use agent::core::protocol::ProtocolViolation;
use agent::core::types::{Message, StepBatch};
use agent::interpreter::{BatchOutcome, InterpreterSettings, StepInterpreter};
use agent::io::backend::BackendClient;
use agent::io::prompt::PromptEngine;
use agent::test_support::{FakeFetcher, ScriptedBackend, ScriptedUi};
use anyhow::Result;
use serde_json::{Value, json};

fn run_batch(ui: &ScriptedUi, backend: &ScriptedBackend, steps: Vec<Value>) -> Result<BatchOutcome> {
    let fetcher = FakeFetcher::new();
    let prompts = PromptEngine::new()?;
    let pipeline = CodeOperationPipeline::new(
        ui,
        BackendClient::new(backend, None),
        &prompts,
        CodeModels {
            model: "gpt-4o".to_string(),
            code_model: "o1-preview".to_string(),
        },
    )?;
    StepInterpreter::new(ui, &fetcher, pipeline, InterpreterSettings::default())
        .run_batch(&StepBatch { steps })
}

fn no_backend() -> ScriptedBackend {
    ScriptedBackend::new(Vec::<String>::new())
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[test]
fn declined_create_has_no_side_effect() {
    let temp = tempfile::tempdir().expect("tempdir");
    let target = temp.path().join("new.txt");
    let ui = ScriptedUi::new(["no"]);

    let outcome = run_batch(
        &ui,
        &no_backend(),
        vec![json!({ "type": "CREATE_FILE", "filePath": path_string(&target), "fileContents": "x" })],
    )
    .expect("run");

    assert!(!target.exists());
    assert_eq!(
        outcome.messages,
        vec![Message::user(format!(
            "File creation aborted: {}",
            target.display()
        ))]
    );
    assert_eq!(ui.ask_count(), 1);
}

#[test]
fn yes_to_all_creates_file_without_asking() {
    let temp = tempfile::tempdir().expect("tempdir");
    let target = temp.path().join("new.txt");
    let ui = ScriptedUi::yes_to_all();

    let outcome = run_batch(
        &ui,
        &no_backend(),
        vec![json!({ "type": "CREATE_FILE", "filePath": path_string(&target), "fileContents": "hello" })],
    )
    .expect("run");

    assert_eq!(fs::read_to_string(&target).expect("read"), "hello");
    assert_eq!(ui.ask_count(), 0);
    assert_eq!(outcome.messages.len(), 1);
    assert_eq!(ui.previews().len(), 1);
    assert_eq!(ui.open_previews(), 0);
}

#[test]
fn unknown_step_halts_batch_before_later_steps() {
    let temp = tempfile::tempdir().expect("tempdir");
    let before = temp.path().join("before.txt");
    let after = temp.path().join("after.txt");
    let ui = ScriptedUi::yes_to_all();

    let err = run_batch(
        &ui,
        &no_backend(),
        vec![
            json!({ "type": "CREATE_FILE", "filePath": path_string(&before), "fileContents": "1" }),
            json!({ "type": "FLY_TO_MOON" }),
            json!({ "type": "CREATE_FILE", "filePath": path_string(&after), "fileContents": "2" }),
        ],
    )
    .unwrap_err();

    assert_eq!(
        err.downcast_ref::<ProtocolViolation>(),
        Some(&ProtocolViolation::UnknownStep {
            index: 1,
            tag: "FLY_TO_MOON".to_string()
        })
    );
    assert!(before.exists());
    assert!(!after.exists());
}

#[test]
fn messages_follow_step_order_with_declines() {
    let temp = tempfile::tempdir().expect("tempdir");
    let a = temp.path().join("a.txt");
    let b = temp.path().join("b.txt");
    let c = temp.path().join("c.txt");
    fs::write(&b, "keep").expect("write");
    let ui = ScriptedUi::new(["yes", "no", "what is next?", "yes"]);

    let outcome = run_batch(
        &ui,
        &no_backend(),
        vec![
            json!({ "type": "CREATE_FILE", "filePath": path_string(&a), "fileContents": "a" }),
            json!({ "type": "DELETE_FILE", "filePath": path_string(&b) }),
            json!({ "type": "QUERY_USER", "message": "Anything else?" }),
            json!({ "type": "EDIT_FILE", "filePath": path_string(&c), "fileContents": "c" }),
        ],
    )
    .expect("run");

    let contents: Vec<String> = outcome
        .messages
        .into_iter()
        .map(|message| message.content)
        .collect();
    assert_eq!(
        contents,
        vec![
            format!("File created: {}", a.display()),
            format!("File deletion aborted: {}", b.display()),
            "what is next?".to_string(),
            format!("File edited: {}", c.display()),
        ]
    );
    assert!(b.exists());
    assert_eq!(fs::read_to_string(&c).expect("read"), "c");
}

#[test]
fn done_first_still_runs_later_steps() {
    let temp = tempfile::tempdir().expect("tempdir");
    let target = temp.path().join("late.txt");
    let ui = ScriptedUi::yes_to_all();

    let outcome = run_batch(
        &ui,
        &no_backend(),
        vec![
            json!({ "type": "DONE" }),
            json!({ "type": "CREATE_FILE", "filePath": path_string(&target), "fileContents": "late" }),
        ],
    )
    .expect("run");

    assert!(outcome.done);
    assert_eq!(outcome.messages.len(), 1);
    assert!(target.exists());
}

#[test]
fn code_operation_rewrites_output_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let input = temp.path().join("in.txt");
    let output = temp.path().join("out.txt");
    fs::write(&input, "old").expect("write");
    let backend = ScriptedBackend::new([
        "new content".to_string(),
        json!({ "steps": [{
            "type": "EDIT_FILE",
            "filePath": path_string(&output),
            "fileContents": "new content",
        }]})
        .to_string(),
    ]);
    let ui = ScriptedUi::yes_to_all();

    let outcome = run_batch(
        &ui,
        &backend,
        vec![json!({
            "type": "CODE_OPERATION",
            "relatedFiles": [path_string(&input)],
            "outputFiles": [path_string(&output)],
            "prompt": "Replace the contents",
        })],
    )
    .expect("run");

    assert_eq!(fs::read_to_string(&output).expect("read"), "new content");
    assert_eq!(outcome.messages.len(), 2);
    assert_eq!(
        outcome.messages[1].content,
        format!("File edited: {}", output.display())
    );

    let requests = backend.requests();
    assert!(requests[0].messages[0].content.contains("old"));
    assert!(requests[1].messages[0].content.contains("new content"));
}
