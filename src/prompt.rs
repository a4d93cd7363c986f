//! Interactive confirmation and value prompts.

use dialoguer::{Confirm, Input, theme::ColorfulTheme};
use thiserror::Error;

/// Errors raised while prompting the user.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum PromptError {
    /// Prompting was disabled for this invocation.
    #[error("a value for {subject} is required but prompting is disabled")]
    Disallowed {
        /// What the prompt would have asked for.
        subject: String,
    },
    /// The terminal interaction failed.
    #[error("failed to read input: {0}")]
    Terminal(String),
}

/// Asks the user questions. Implementations may refuse to prompt.
pub trait Prompter {
    /// Asks a yes/no question. Declining is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when the question cannot be asked.
    fn confirm(&self, message: &str) -> Result<bool, PromptError>;

    /// Asks for a free-form value, offering `default` when present.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when the question cannot be asked.
    fn input(&self, label: &str, default: Option<&str>) -> Result<String, PromptError>;
}

/// Prompts on the controlling terminal using `dialoguer`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, message: &str) -> Result<bool, PromptError> {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(message)
            .default(false)
            .interact()
            .map_err(|err| PromptError::Terminal(err.to_string()))
    }

    fn input(&self, label: &str, default: Option<&str>) -> Result<String, PromptError> {
        let theme = ColorfulTheme::default();
        let mut input = Input::<String>::with_theme(&theme).with_prompt(label);
        if let Some(value) = default {
            input = input.default(value.to_owned());
        }
        input
            .interact_text()
            .map(|value| value.trim().to_owned())
            .map_err(|err| PromptError::Terminal(err.to_string()))
    }
}

/// Prompter used when `--yes` is passed: every question is refused.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn confirm(&self, message: &str) -> Result<bool, PromptError> {
        Err(PromptError::Disallowed {
            subject: message.to_owned(),
        })
    }

    fn input(&self, label: &str, _default: Option<&str>) -> Result<String, PromptError> {
        Err(PromptError::Disallowed {
            subject: label.to_owned(),
        })
    }
}
