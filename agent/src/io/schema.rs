//! Response formats for structured backend calls and batch envelope checks.
//!
//! The strict per-variant schemas are sent to the backend. Returned batches are
//! only checked against the envelope (`{steps: [{type: string, ..}]}`); step
//! payloads are decoded one at a time by the interpreters.

use anyhow::{Context, Result};
use jsonschema::Draft;
use serde_json::{Value, json};
use tracing::warn;

use crate::core::protocol::ProtocolViolation;
use crate::core::types::StepBatch;
use crate::io::backend::ResponseFormat;

const AUTO_STEPS_SCHEMA: &str = include_str!("../../schemas/auto_steps.schema.json");
const FS_STEPS_SCHEMA: &str = include_str!("../../schemas/fs_steps.schema.json");

pub const AUTO_STEPS_NAME: &str = "auto_steps";
pub const FS_STEPS_NAME: &str = "fs_steps";

/// Format constraining the backend to the full step vocabulary.
pub fn auto_steps_format() -> Result<ResponseFormat> {
    load_format(AUTO_STEPS_NAME, AUTO_STEPS_SCHEMA)
}

/// Format constraining the backend to the four filesystem steps.
pub fn fs_steps_format() -> Result<ResponseFormat> {
    load_format(FS_STEPS_NAME, FS_STEPS_SCHEMA)
}

fn load_format(name: &str, raw: &str) -> Result<ResponseFormat> {
    let schema: Value =
        serde_json::from_str(raw).with_context(|| format!("parse {name} schema"))?;
    Ok(ResponseFormat {
        name: name.to_string(),
        schema,
    })
}

fn envelope_schema() -> Value {
    json!({
        "type": "object",
        "required": ["steps"],
        "properties": {
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["type"],
                    "properties": { "type": { "type": "string" } }
                }
            }
        }
    })
}

/// Parse backend output into a batch, rejecting anything that is not a step envelope.
///
/// Failures are [`ProtocolViolation::MalformedBatch`] wrapped in `anyhow`.
pub fn parse_batch(text: &str) -> Result<StepBatch> {
    let value: Value = serde_json::from_str(text).map_err(|err| {
        warn!(err = %err, "backend returned invalid json");
        ProtocolViolation::MalformedBatch {
            reason: format!("invalid json: {err}"),
        }
    })?;

    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&envelope_schema())
        .context("compile envelope schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        warn!(errors = messages.len(), "batch envelope failed validation");
        return Err(ProtocolViolation::MalformedBatch {
            reason: messages.join("; "),
        }
        .into());
    }

    let batch: StepBatch = serde_json::from_value(value).map_err(|err| {
        ProtocolViolation::MalformedBatch {
            reason: err.to_string(),
        }
    })?;
    Ok(batch)
}
