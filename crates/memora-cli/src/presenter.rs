//! Terminal [`Presenter`] for recall sessions.
//!
//! Reads the person's answers line by line and prints whatever the session
//! produced at its current stage.  Generic over the reader/writer so the
//! conversation can be replayed in tests.

use colored::Colorize;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use memora_runtime::{Confirmation, Presenter, RecallSession, TextRequest};
use memora_types::{MemoraError, Stage};

/// Typing this at any prompt ends the session.
pub const END_WORD: &str = "/end";

pub struct TerminalPresenter<R, W> {
    reader: R,
    writer: W,
    shutdown: Arc<AtomicBool>,
}

impl<R: BufRead, W: Write> TerminalPresenter<R, W> {
    pub fn new(reader: R, writer: W, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            reader,
            writer,
            shutdown,
        }
    }

    #[cfg(test)]
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn ask(&mut self, prompt: &str) -> Option<String> {
        if self.shutdown.load(Ordering::SeqCst) {
            return None;
        }
        write!(self.writer, "{} ", prompt.bold().cyan()).ok();
        self.writer.flush().ok();

        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) if self.shutdown.load(Ordering::SeqCst) => None,
            Ok(_) => {
                let line = line.trim_end_matches(['\r', '\n']).to_string();
                (line.trim() != END_WORD).then_some(line)
            }
        }
    }

    fn say(&mut self, label: &str, text: Option<&str>) {
        if let Some(text) = text {
            writeln!(self.writer, "\n{}\n{}\n", label.bold().green(), text).ok();
        }
    }
}

impl<R: BufRead, W: Write> Presenter for TerminalPresenter<R, W> {
    fn render(&mut self, session: &RecallSession) {
        match session.stage() {
            Stage::Greeting => {
                writeln!(
                    self.writer,
                    "\n  Say hello to your assistant to begin.  Type {} to stop at any time.\n",
                    END_WORD.bold()
                )
                .ok();
            }
            Stage::RoutineShown => self.say("Assistant:", session.routine()),
            Stage::HintShown => {
                let label = format!("Hint #{}:", session.hints_given());
                self.say(&label, session.hint());
            }
            Stage::MemoryRevealed => self.say("The memory:", session.reveal()),
        }
    }

    fn input(&mut self, request: TextRequest) -> Option<String> {
        let prompt = match request {
            TextRequest::Greeting => "You:",
            TextRequest::RecallAttempt => "What do you think this memory is about?",
        };
        let answer = self.ask(prompt)?;
        writeln!(self.writer, "{}", "  … thinking".dimmed()).ok();
        Some(answer)
    }

    fn confirm(&mut self, question: Confirmation) -> bool {
        let prompt = match question {
            Confirmation::RecallMemory => "Would you like to try recalling a memory? [Y/n]",
            Confirmation::AnotherMemory => "Would you like to try another memory? [Y/n]",
        };
        match self.ask(prompt) {
            Some(answer) => !matches!(answer.trim().to_lowercase().as_str(), "n" | "no"),
            None => false,
        }
    }

    fn report(&mut self, error: &MemoraError) {
        writeln!(self.writer, "{} {}", "Error:".red().bold(), error).ok();
        if matches!(error, MemoraError::Generation(_)) {
            writeln!(
                self.writer,
                "  {}",
                "Is Ollama running and is the text model pulled?  Let's try that again.".dimmed()
            )
            .ok();
        }
    }
}
