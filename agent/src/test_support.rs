//! Scripted stand-ins for the backend, user and network.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use anyhow::{Result, anyhow};

use crate::io::backend::{Backend, CompletionRequest};
use crate::io::fetch::{FetchedPage, Fetcher};
use crate::io::ui::{FileOperationKind, Ui};

/// Backend that replays responses in order and records every request.
pub struct ScriptedBackend {
    responses: RefCell<VecDeque<String>>,
    requests: RefCell<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: RefCell::new(responses.into_iter().map(Into::into).collect()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl Backend for ScriptedBackend {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.borrow_mut().push(request.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted backend exhausted"))
    }
}

/// A file operation preview shown through [`Ui::set_file_operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub kind: FileOperationKind,
    pub file_name: String,
    pub contents: String,
}

/// UI that answers prompts and questions from one queue.
///
/// An exhausted queue answers `None` to prompts and an empty string (a
/// decline) to questions.
pub struct ScriptedUi {
    answers: RefCell<VecDeque<String>>,
    yes_to_all: bool,
    asks: Cell<usize>,
    prompts: RefCell<Vec<String>>,
    logs: RefCell<Vec<String>>,
    previews: RefCell<Vec<Preview>>,
    open_previews: Cell<i32>,
}

impl ScriptedUi {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: RefCell::new(answers.into_iter().map(Into::into).collect()),
            yes_to_all: false,
            asks: Cell::new(0),
            prompts: RefCell::new(Vec::new()),
            logs: RefCell::new(Vec::new()),
            previews: RefCell::new(Vec::new()),
            open_previews: Cell::new(0),
        }
    }

    pub fn yes_to_all() -> Self {
        Self {
            yes_to_all: true,
            ..Self::new(Vec::<String>::new())
        }
    }

    /// Number of [`Ui::ask_user`] calls.
    pub fn ask_count(&self) -> usize {
        self.asks.get()
    }

    /// Texts passed to [`Ui::prompt_user`].
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn logs(&self) -> Vec<String> {
        self.logs.borrow().clone()
    }

    pub fn previews(&self) -> Vec<Preview> {
        self.previews.borrow().clone()
    }

    /// Previews opened but not yet closed.
    pub fn open_previews(&self) -> i32 {
        self.open_previews.get()
    }

    fn next_answer(&self) -> Option<String> {
        self.answers.borrow_mut().pop_front()
    }
}

impl Ui for ScriptedUi {
    fn prompt_user(&self, _label: &str, prompt: &str) -> Result<Option<String>> {
        self.prompts.borrow_mut().push(prompt.to_string());
        Ok(self.next_answer())
    }

    fn ask_user(&self, _label: &str, _question: &str) -> Result<String> {
        self.asks.set(self.asks.get() + 1);
        Ok(self.next_answer().unwrap_or_default())
    }

    fn log(&self, line: &str) {
        self.logs.borrow_mut().push(line.to_string());
    }

    fn yes_to_all(&self) -> bool {
        self.yes_to_all
    }

    fn set_file_operation(&self, kind: FileOperationKind, file_name: &str, contents: &str) {
        self.open_previews.set(self.open_previews.get() + 1);
        self.previews.borrow_mut().push(Preview {
            kind,
            file_name: file_name.to_string(),
            contents: contents.to_string(),
        });
    }

    fn close_file_operation(&self) {
        self.open_previews.set(self.open_previews.get() - 1);
    }
}

/// Fetcher serving canned pages; unknown URLs fail like an unreachable host.
#[derive(Default)]
pub struct FakeFetcher {
    pages: RefCell<HashMap<String, FetchedPage>>,
    requested: RefCell<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, url: &str, status: u16, body: &str) {
        self.pages.borrow_mut().insert(
            url.to_string(),
            FetchedPage {
                status,
                body: body.as_bytes().to_vec(),
            },
        );
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

impl Fetcher for FakeFetcher {
    fn get(&self, url: &str) -> Result<FetchedPage> {
        self.requested.borrow_mut().push(url.to_string());
        self.pages
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("could not connect to {url}"))
    }
}
