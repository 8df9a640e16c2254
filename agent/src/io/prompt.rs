//! Prompt templates and rendering.
//!
//! Templates are compiled into the binary. A rendered prompt keeps the template
//! source and arguments alongside the text because both feed the cache key.

use anyhow::{Context, Result};
use minijinja::Environment;
use serde_json::Value;
use tracing::debug;

/// A named template compiled into the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub name: &'static str,
    pub source: &'static str,
}

pub const SYSTEM: Template = Template {
    name: "system.md",
    source: include_str!("prompts/system.md"),
};

pub const AUTO_CODE: Template = Template {
    name: "auto_code.md",
    source: include_str!("prompts/auto_code.md"),
};

pub const CODE_SYNTHESIS: Template = Template {
    name: "code_synthesis.md",
    source: include_str!("prompts/code_synthesis.md"),
};

pub const CODE_TRANSLATION: Template = Template {
    name: "code_translation.md",
    source: include_str!("prompts/code_translation.md"),
};

pub const SUMMARISE_FILE: Template = Template {
    name: "summarise_file.md",
    source: include_str!("prompts/summarise_file.md"),
};

pub const SUMMARISE_SUMMARIES: Template = Template {
    name: "summarise_summaries.md",
    source: include_str!("prompts/summarise_summaries.md"),
};

pub const SUMMARISE_META_SUMMARIES: Template = Template {
    name: "summarise_meta_summaries.md",
    source: include_str!("prompts/summarise_meta_summaries.md"),
};

const ALL_TEMPLATES: [Template; 7] = [
    SYSTEM,
    AUTO_CODE,
    CODE_SYNTHESIS,
    CODE_TRANSLATION,
    SUMMARISE_FILE,
    SUMMARISE_SUMMARIES,
    SUMMARISE_META_SUMMARIES,
];

/// Output of [`PromptEngine::render`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub template_source: &'static str,
    pub args: Value,
    pub text: String,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        for template in ALL_TEMPLATES {
            env.add_template(template.name, template.source)
                .with_context(|| format!("parse template {}", template.name))?;
        }
        Ok(Self { env })
    }

    pub fn render(&self, template: &Template, args: Value) -> Result<RenderedPrompt> {
        let text = self
            .env
            .get_template(template.name)
            .with_context(|| format!("load template {}", template.name))?
            .render(&args)
            .with_context(|| format!("render template {}", template.name))?;
        debug!(template = template.name, len = text.len(), "rendered prompt");
        Ok(RenderedPrompt {
            template_source: template.source,
            args,
            text,
        })
    }
}
