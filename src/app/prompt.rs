use std::io::{self, BufRead, Write};

use parking_lot::Mutex;

/// Yes/no confirmation asked before destructive operations.
pub trait Prompt: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

/// Asks on the terminal. Anything other than y/yes declines, as does a
/// non-interactive stdin unless `assume_yes` is set.
#[derive(Debug, Default)]
pub struct StdinPrompt {
    pub assume_yes: bool,
}

impl StdinPrompt {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Prompt for StdinPrompt {
    fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        if !atty::is(atty::Stream::Stdin) {
            tracing::warn!("confirmation needed but stdin is not a terminal; pass --yes");
            return false;
        }
        eprint!("{message} [y/N] ");
        if io::stderr().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// Two-step confirmation for the TUI. The first call records the question
/// and declines so the caller can open a modal; once the user answers, the
/// caller re-runs the operation and the stored answer is consumed.
#[derive(Debug, Default)]
pub struct ModalPrompt {
    answer: Mutex<Option<bool>>,
    pending: Mutex<Option<String>>,
}

impl ModalPrompt {
    pub fn answer_next(&self, answer: bool) {
        *self.answer.lock() = Some(answer);
    }

    pub fn take_pending(&self) -> Option<String> {
        self.pending.lock().take()
    }

    /// Drops an answer the re-run never asked for.
    pub fn discard_answer(&self) {
        self.answer.lock().take();
    }
}

impl Prompt for ModalPrompt {
    fn confirm(&self, message: &str) -> bool {
        if let Some(answer) = self.answer.lock().take() {
            return answer;
        }
        *self.pending.lock() = Some(message.to_string());
        false
    }
}

/// Fixed answer; records every question asked.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct AnsweredPrompt {
    answer: bool,
    asked: Mutex<Vec<String>>,
}

#[cfg(test)]
impl AnsweredPrompt {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().clone()
    }
}

#[cfg(test)]
impl Prompt for AnsweredPrompt {
    fn confirm(&self, message: &str) -> bool {
        self.asked.lock().push(message.to_string());
        self.answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modal_prompt_defers_then_consumes_answer() {
        let prompt = ModalPrompt::default();
        assert!(!prompt.confirm("Delete?"));
        assert_eq!(prompt.take_pending().as_deref(), Some("Delete?"));
        assert_eq!(prompt.take_pending(), None);

        prompt.answer_next(true);
        assert!(prompt.confirm("Delete?"));
        assert_eq!(prompt.take_pending(), None);
        // answer is single-use
        assert!(!prompt.confirm("Delete?"));
    }

    #[test]
    fn discarded_answer_is_not_used_by_the_next_question() {
        let prompt = ModalPrompt::default();
        prompt.answer_next(true);
        prompt.discard_answer();
        assert!(!prompt.confirm("Delete?"));
        assert_eq!(prompt.take_pending().as_deref(), Some("Delete?"));
    }

    #[test]
    fn assume_yes_skips_the_terminal() {
        assert!(StdinPrompt::new(true).confirm("Delete?"));
    }
}
