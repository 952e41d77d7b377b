use std::io::{self, BufRead, Write};

use async_trait::async_trait;

use crate::orchestrator::{ConfirmationGate, ConfirmationPrompt};

/// Asks on stderr and reads `y/N` from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinGate;

#[async_trait]
impl ConfirmationGate for StdinGate {
    async fn confirm(&self, prompt: &ConfirmationPrompt) -> bool {
        let question = prompt.to_string();
        tokio::task::spawn_blocking(move || ask(&question, io::stdin().lock(), io::stderr()))
            .await
            .unwrap_or(false)
    }
}

/// Anything but an explicit yes (including EOF and I/O errors) is a no.
pub fn ask(question: &str, mut input: impl BufRead, mut output: impl Write) -> bool {
    if write!(output, "{question} [y/N] ").and_then(|_| output.flush()).is_err() {
        return false;
    }
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(_) => is_yes(&line),
        Err(_) => false,
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "д" | "да")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_explicit_yes_confirms() {
        for answer in ["y\n", "YES\n", "да\n", " Д \n"] {
            assert!(ask("Load?", answer.as_bytes(), Vec::new()), "{answer:?}");
        }
        for answer in ["\n", "n\n", "maybe\n", ""] {
            assert!(!ask("Load?", answer.as_bytes(), Vec::new()), "{answer:?}");
        }
    }

    #[test]
    fn question_is_written_with_hint() {
        let mut out = Vec::new();
        ask("Load?", "n\n".as_bytes(), &mut out);
        assert_eq!(String::from_utf8(out).unwrap(), "Load? [y/N] ");
    }
}
