//! Decoding of raw batch entries into typed steps.
//!
//! Any deviation from the step protocol is a [`ProtocolViolation`]. It is fatal
//! to the batch and is never converted into a conversation message.

use std::fmt;

use serde_json::Value;

use crate::core::types::{AutoStep, FsStep, StepKind};

/// The backend returned something the step protocol does not allow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// The response was not a `{ "steps": [...] }` envelope.
    MalformedBatch { reason: String },
    /// A step object had no string `type` field.
    MissingTag { index: usize },
    /// The `type` field named a step that does not exist.
    UnknownStep { index: usize, tag: String },
    /// The step exists but is not allowed in this batch family.
    UnsupportedStep { index: usize, tag: String },
    /// The step tag is known but its fields did not match the variant.
    MalformedStep {
        index: usize,
        tag: String,
        reason: String,
    },
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolViolation::MalformedBatch { reason } => {
                write!(f, "protocol violation: malformed step batch: {reason}")
            }
            ProtocolViolation::MissingTag { index } => {
                write!(f, "protocol violation: step {index} has no type tag")
            }
            ProtocolViolation::UnknownStep { index, tag } => {
                write!(f, "protocol violation: step {index} has unknown type '{tag}'")
            }
            ProtocolViolation::UnsupportedStep { index, tag } => write!(
                f,
                "protocol violation: step {index} of type '{tag}' is not allowed here"
            ),
            ProtocolViolation::MalformedStep { index, tag, reason } => write!(
                f,
                "protocol violation: step {index} of type '{tag}' is malformed: {reason}"
            ),
        }
    }
}

impl std::error::Error for ProtocolViolation {}

/// Decode one entry of an agent batch.
pub fn decode_auto_step(index: usize, raw: &Value) -> Result<AutoStep, ProtocolViolation> {
    let (_, tag) = step_kind(index, raw)?;
    serde_json::from_value(raw.clone()).map_err(|err| ProtocolViolation::MalformedStep {
        index,
        tag: tag.to_string(),
        reason: err.to_string(),
    })
}

/// Decode one entry of a filesystem-only batch.
pub fn decode_fs_step(index: usize, raw: &Value) -> Result<FsStep, ProtocolViolation> {
    let (kind, tag) = step_kind(index, raw)?;
    if !kind.is_fs() {
        return Err(ProtocolViolation::UnsupportedStep {
            index,
            tag: tag.to_string(),
        });
    }
    serde_json::from_value(raw.clone()).map_err(|err| ProtocolViolation::MalformedStep {
        index,
        tag: tag.to_string(),
        reason: err.to_string(),
    })
}

fn step_kind(index: usize, raw: &Value) -> Result<(StepKind, &str), ProtocolViolation> {
    let tag = raw
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolViolation::MissingTag { index })?;
    let kind = StepKind::from_tag(tag).ok_or_else(|| ProtocolViolation::UnknownStep {
        index,
        tag: tag.to_string(),
    })?;
    Ok((kind, tag))
}
