//! Prompter and reporter doubles.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::prompt::{PromptError, Prompter};
use crate::report::Reporter;

use super::locked;

#[derive(Clone, Debug)]
enum Answer {
    Input(String),
    Confirm(bool),
}

/// Prompter answering from a queue.
///
/// An exhausted queue, or an answer of the wrong kind, is treated as a
/// prompter that may not ask, so tests only script the questions they
/// expect.
#[derive(Clone, Debug, Default)]
pub struct ScriptedPrompter {
    answers: Arc<Mutex<VecDeque<Answer>>>,
    asked: Arc<Mutex<Vec<String>>>,
    offered: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl ScriptedPrompter {
    /// Creates a prompter with no scripted answers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the answer to the next free-text question.
    pub fn push_input(&self, value: impl Into<String>) {
        locked(&self.answers).push_back(Answer::Input(value.into()));
    }

    /// Queues the answer to the next confirmation.
    pub fn push_confirm(&self, value: bool) {
        locked(&self.answers).push_back(Answer::Confirm(value));
    }

    /// Labels and messages asked so far, in order.
    #[must_use]
    pub fn asked(&self) -> Vec<String> {
        locked(&self.asked).clone()
    }

    /// Default offered with the most recent free-text question `label`.
    #[must_use]
    pub fn offered(&self, label: &str) -> Option<String> {
        locked(&self.offered)
            .iter()
            .rev()
            .find(|(asked, _)| asked == label)
            .and_then(|(_, default)| default.clone())
    }

    fn next(&self, subject: &str) -> Option<Answer> {
        locked(&self.asked).push(subject.to_owned());
        locked(&self.answers).pop_front()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, message: &str) -> Result<bool, PromptError> {
        match self.next(message) {
            Some(Answer::Confirm(value)) => Ok(value),
            _ => Err(PromptError::Disallowed {
                subject: message.to_owned(),
            }),
        }
    }

    fn input(&self, label: &str, default: Option<&str>) -> Result<String, PromptError> {
        locked(&self.offered).push((label.to_owned(), default.map(str::to_owned)));
        match self.next(label) {
            Some(Answer::Input(value)) => Ok(value),
            _ => Err(PromptError::Disallowed {
                subject: label.to_owned(),
            }),
        }
    }
}

/// Reporter that keeps everything it was told.
#[derive(Clone, Debug, Default)]
pub struct RecordingReporter {
    lines: Arc<Mutex<Vec<String>>>,
    warnings: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    /// Creates an empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Informational lines, in order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        locked(&self.lines).clone()
    }

    /// Warnings, in order.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        locked(&self.warnings).clone()
    }

    /// Returns `true` when any line or warning contains `needle`.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        self.lines()
            .iter()
            .chain(self.warnings().iter())
            .any(|text| text.contains(needle))
    }
}

impl Reporter for RecordingReporter {
    fn line(&self, text: &str) {
        locked(&self.lines).push(text.to_owned());
    }

    fn warn(&self, text: &str) {
        locked(&self.warnings).push(text.to_owned());
    }
}
