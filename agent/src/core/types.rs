//! Shared types for the step protocol and the conversation transcript.
//!
//! Step variants mirror the wire protocol exactly: the `type` field is the
//! discriminator and every other field is camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single role-tagged message in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Discriminator of every step the protocol knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    CreateFile,
    CreateDir,
    EditFile,
    DeleteFile,
    RequestFile,
    QueryUser,
    RunShell,
    GoogleSearch,
    HttpRequestGet,
    CodeOperation,
    Done,
}

impl StepKind {
    pub const ALL: [StepKind; 11] = [
        StepKind::CreateFile,
        StepKind::CreateDir,
        StepKind::EditFile,
        StepKind::DeleteFile,
        StepKind::RequestFile,
        StepKind::QueryUser,
        StepKind::RunShell,
        StepKind::GoogleSearch,
        StepKind::HttpRequestGet,
        StepKind::CodeOperation,
        StepKind::Done,
    ];

    /// Wire tag used in the `type` field.
    pub fn tag(self) -> &'static str {
        match self {
            StepKind::CreateFile => "CREATE_FILE",
            StepKind::CreateDir => "CREATE_DIR",
            StepKind::EditFile => "EDIT_FILE",
            StepKind::DeleteFile => "DELETE_FILE",
            StepKind::RequestFile => "REQUEST_FILE",
            StepKind::QueryUser => "QUERY_USER",
            StepKind::RunShell => "RUN_SHELL",
            StepKind::GoogleSearch => "GOOGLE_SEARCH",
            StepKind::HttpRequestGet => "HTTP_REQUEST_GET",
            StepKind::CodeOperation => "CODE_OPERATION",
            StepKind::Done => "DONE",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Whether this kind belongs to the restricted filesystem family.
    pub fn is_fs(self) -> bool {
        matches!(
            self,
            StepKind::CreateFile | StepKind::CreateDir | StepKind::EditFile | StepKind::DeleteFile
        )
    }
}

/// Filesystem-only step, produced by the code operation translation phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum FsStep {
    CreateFile {
        file_path: String,
        file_contents: String,
    },
    CreateDir {
        dir_path: String,
    },
    EditFile {
        file_path: String,
        file_contents: String,
    },
    DeleteFile {
        file_path: String,
    },
}

impl FsStep {
    pub fn kind(&self) -> StepKind {
        match self {
            FsStep::CreateFile { .. } => StepKind::CreateFile,
            FsStep::CreateDir { .. } => StepKind::CreateDir,
            FsStep::EditFile { .. } => StepKind::EditFile,
            FsStep::DeleteFile { .. } => StepKind::DeleteFile,
        }
    }
}

/// Any step the top-level agent loop may receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum AutoStep {
    CreateFile {
        file_path: String,
        file_contents: String,
    },
    CreateDir {
        dir_path: String,
    },
    EditFile {
        file_path: String,
        file_contents: String,
    },
    DeleteFile {
        file_path: String,
    },
    RequestFile {
        file_path: String,
    },
    QueryUser {
        message: String,
    },
    RunShell {
        cwd: String,
        command: String,
    },
    GoogleSearch {
        query: String,
    },
    HttpRequestGet {
        url: String,
    },
    CodeOperation {
        related_files: Vec<String>,
        output_files: Vec<String>,
        prompt: String,
    },
    Done,
}

impl AutoStep {
    pub fn kind(&self) -> StepKind {
        match self {
            AutoStep::CreateFile { .. } => StepKind::CreateFile,
            AutoStep::CreateDir { .. } => StepKind::CreateDir,
            AutoStep::EditFile { .. } => StepKind::EditFile,
            AutoStep::DeleteFile { .. } => StepKind::DeleteFile,
            AutoStep::RequestFile { .. } => StepKind::RequestFile,
            AutoStep::QueryUser { .. } => StepKind::QueryUser,
            AutoStep::RunShell { .. } => StepKind::RunShell,
            AutoStep::GoogleSearch { .. } => StepKind::GoogleSearch,
            AutoStep::HttpRequestGet { .. } => StepKind::HttpRequestGet,
            AutoStep::CodeOperation { .. } => StepKind::CodeOperation,
            AutoStep::Done => StepKind::Done,
        }
    }
}

/// Ordered steps returned by one backend call.
///
/// Steps are kept as raw JSON and decoded one at a time by the interpreter, so a
/// step with an unknown tag halts the batch only when execution reaches it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepBatch {
    pub steps: Vec<Value>,
}

impl StepBatch {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auto_step_decodes_wire_format() {
        let step: AutoStep = serde_json::from_value(json!({
            "type": "CODE_OPERATION",
            "relatedFiles": ["a.rs"],
            "outputFiles": ["b.rs"],
            "prompt": "split it"
        }))
        .expect("decode");
        assert_eq!(
            step,
            AutoStep::CodeOperation {
                related_files: vec!["a.rs".to_string()],
                output_files: vec!["b.rs".to_string()],
                prompt: "split it".to_string(),
            }
        );
    }

    #[test]
    fn done_decodes_without_fields() {
        let step: AutoStep = serde_json::from_value(json!({ "type": "DONE" })).expect("decode");
        assert_eq!(step, AutoStep::Done);
    }

    #[test]
    fn fs_step_serializes_camel_case_fields() {
        let value = serde_json::to_value(FsStep::EditFile {
            file_path: "/tmp/x".to_string(),
            file_contents: "hi".to_string(),
        })
        .expect("encode");
        assert_eq!(
            value,
            json!({ "type": "EDIT_FILE", "filePath": "/tmp/x", "fileContents": "hi" })
        );
    }

    #[test]
    fn step_kind_tags_are_unique() {
        for kind in StepKind::ALL {
            assert_eq!(StepKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(StepKind::from_tag("FLY_TO_MOON"), None);
    }
}
