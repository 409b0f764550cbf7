//! Yes/no questions on the terminal.

use dialoguer::Confirm;
use galley::provision::host::OperatorPrompt;
use std::io::IsTerminal;
use tracing::{info, warn};

/// Asks on the terminal; without one every question takes its default.
#[derive(Debug, Clone, Copy)]
pub struct TerminalPrompt {
    interactive: bool,
}

impl TerminalPrompt {
    #[must_use]
    pub fn new() -> Self {
        Self {
            interactive: std::io::stdin().is_terminal() && std::io::stderr().is_terminal(),
        }
    }

    /// Whether questions reach an operator
    #[must_use]
    pub const fn is_interactive(&self) -> bool {
        self.interactive
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorPrompt for TerminalPrompt {
    fn confirm(&self, question: &str, default_yes: bool) -> bool {
        if !self.interactive {
            info!(question, answer = default_yes, "no terminal, using default answer");
            return default_yes;
        }

        let answer = Confirm::new()
            .with_prompt(question)
            .default(default_yes)
            .interact()
            .unwrap_or_else(|e| {
                warn!(error = %e, "cannot read answer, using default");
                default_yes
            });
        info!(question, answer, "operator answered");
        answer
    }
}
