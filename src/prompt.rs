//! Operator prompts
//!
//! Provisioners never talk to the terminal directly. They ask a [`Prompter`],
//! which is a dialoguer-backed terminal reader in production and a scripted
//! answer source in tests.

use anyhow::{Result, bail};
use dialoguer::{Confirm, Input, Password};

use crate::ui;

pub trait Prompter {
    /// Ask a yes/no question
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;

    /// Read a line of text; an empty answer yields `default` when given
    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// Read a hidden line of text
    fn secret(&mut self, prompt: &str) -> Result<String>;
}

/// Interactive terminal prompts
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }

    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        Ok(input.interact_text()?.trim().to_string())
    }

    fn secret(&mut self, prompt: &str) -> Result<String> {
        let secret = Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()?;
        Ok(secret)
    }
}

/// Answers "no" to everything; used when no operator is attached
#[derive(Debug, Default)]
pub struct DeclineAll;

impl Prompter for DeclineAll {
    fn confirm(&mut self, _prompt: &str, _default: bool) -> Result<bool> {
        Ok(false)
    }

    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        match default {
            Some(default) => Ok(default.to_string()),
            None => bail!("No operator to answer: {prompt}"),
        }
    }

    fn secret(&mut self, prompt: &str) -> Result<String> {
        bail!("No operator to answer: {prompt}")
    }
}

/// Ask until the answer is non-empty
pub fn required_input(
    prompter: &mut dyn Prompter,
    prompt: &str,
    default: Option<&str>,
) -> Result<String> {
    let default = default.filter(|d| !d.trim().is_empty());
    loop {
        let answer = prompter.input(prompt, default)?;
        let answer = answer.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
        ui::warn(&format!("{prompt}: a value is required"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Answer, ScriptedPrompter};

    #[test]
    fn test_required_input_reprompts_until_non_empty() {
        let mut prompter = ScriptedPrompter::new(vec![
            Answer::text(""),
            Answer::text("   "),
            Answer::text("git@example.com:org/infra.git"),
        ]);
        let answer = required_input(&mut prompter, "Repository URL", None).unwrap();
        assert_eq!(answer, "git@example.com:org/infra.git");
        assert_eq!(prompter.asked().len(), 3);
    }

    #[test]
    fn test_required_input_uses_default_on_empty() {
        let mut prompter = ScriptedPrompter::new(vec![Answer::text("")]);
        let answer = required_input(&mut prompter, "Branch", Some("main")).unwrap();
        assert_eq!(answer, "main");
    }

    #[test]
    fn test_decline_all() {
        let mut prompter = DeclineAll;
        assert!(!prompter.confirm("Proceed?", true).unwrap());
        assert_eq!(prompter.input("Branch", Some("main")).unwrap(), "main");
        assert!(prompter.input("Repository URL", None).is_err());
        assert!(prompter.secret("Vault password").is_err());
    }
}
