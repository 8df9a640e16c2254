//! User-interaction capability consumed by the interpreter.
//!
//! The [`Ui`] trait is the only way the agent talks to a human: asking
//! questions, logging status lines and confirming side effects. [`ConsoleUi`]
//! implements it over line-based stdin/stdout; tests use scripted stubs.

use std::cell::RefCell;
use std::io::{BufRead, Stdin, StdinLock, Stdout, Write};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::policy::is_affirmative;

/// Kind of file mutation being previewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperationKind {
    Create,
    CreateDir,
    Edit,
    Delete,
}

impl FileOperationKind {
    pub fn label(self) -> &'static str {
        match self {
            FileOperationKind::Create => "Create File",
            FileOperationKind::CreateDir => "Create Directory",
            FileOperationKind::Edit => "Edit File",
            FileOperationKind::Delete => "Delete File",
        }
    }
}

/// Interaction surface between the agent and the user.
pub trait Ui {
    /// Ask for free text. `None` means the user gave no answer.
    fn prompt_user(&self, label: &str, prompt: &str) -> Result<Option<String>>;

    /// Ask a short question, typically yes/no.
    fn ask_user(&self, label: &str, question: &str) -> Result<String>;

    /// Fire-and-forget status line.
    fn log(&self, line: &str);

    /// Session-level confirmation bypass.
    fn yes_to_all(&self) -> bool;

    /// Preview a pending file mutation. Non-visual implementations may ignore it.
    fn set_file_operation(&self, _kind: FileOperationKind, _file_name: &str, _contents: &str) {}

    /// Dismiss the preview opened by [`Ui::set_file_operation`].
    fn close_file_operation(&self) {}
}

/// Ask the user to confirm a side effect, honouring yes-to-all.
///
/// With yes-to-all set the question is never asked.
pub fn confirm<U: Ui + ?Sized>(ui: &U, question: &str) -> Result<bool> {
    if ui.yes_to_all() {
        debug!("confirmation bypassed by yes-to-all");
        return Ok(true);
    }
    let answer = ui.ask_user("Confirm", &format!("{question} (yes/no)"))?;
    Ok(is_affirmative(&answer))
}

/// Line-oriented console implementation.
pub struct ConsoleUi<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
    yes_to_all: bool,
}

impl ConsoleUi<StdinLock<'static>, Stdout> {
    /// Console bound to the process stdin/stdout.
    pub fn stdio(yes_to_all: bool) -> Self {
        let stdin: Stdin = std::io::stdin();
        Self::new(stdin.lock(), std::io::stdout(), yes_to_all)
    }
}

impl<R: BufRead, W: Write> ConsoleUi<R, W> {
    pub fn new(input: R, output: W, yes_to_all: bool) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
            yes_to_all,
        }
    }

    /// Consume the console and return the output sink.
    pub fn into_output(self) -> W {
        self.output.into_inner()
    }

    fn read_answer(&self, label: &str, text: &str) -> Result<Option<String>> {
        {
            let mut output = self.output.borrow_mut();
            writeln!(output, "{label}: {text}").context("write prompt")?;
            output.flush().context("flush prompt")?;
        }
        let mut line = String::new();
        let read = self
            .input
            .borrow_mut()
            .read_line(&mut line)
            .context("read answer")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

impl<R: BufRead, W: Write> Ui for ConsoleUi<R, W> {
    fn prompt_user(&self, label: &str, prompt: &str) -> Result<Option<String>> {
        let answer = self.read_answer(label, prompt)?;
        Ok(answer.filter(|text| !text.is_empty()))
    }

    fn ask_user(&self, label: &str, question: &str) -> Result<String> {
        Ok(self.read_answer(label, question)?.unwrap_or_default())
    }

    fn log(&self, line: &str) {
        let mut output = self.output.borrow_mut();
        let _ = writeln!(output, "{line}");
    }

    fn yes_to_all(&self) -> bool {
        self.yes_to_all
    }

    fn set_file_operation(&self, kind: FileOperationKind, file_name: &str, contents: &str) {
        self.log(&format!("File operation {} on {}", kind.label(), file_name));
        if !contents.is_empty() {
            self.log(contents);
        }
    }
}
