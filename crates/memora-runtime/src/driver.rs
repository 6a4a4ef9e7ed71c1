//! [`run_session`] – drives a [`RecallSessionMachine`] through a
//! [`Presenter`].
//!
//! The presenter is the synchronous boundary to whatever renders the
//! session (terminal, web page, app).  It is shown the session after every
//! successful transition and asked for the person's input.  Errors are
//! reported to it and the same step is offered again, so a model hiccup
//! never ends the session.

use memora_types::{MemoraError, Stage};
use tracing::info;

use crate::session::{RecallSession, RecallSessionMachine};

/// Free-text input the session needs from the person.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRequest {
    /// "Say hello to your assistant."
    Greeting,
    /// "What do you think this memory is about?"
    RecallAttempt,
}

/// Yes/no questions the session asks between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// After the routine: "Try to recall a memory?"
    RecallMemory,
    /// After a reveal: "Try another memory?"
    AnotherMemory,
}

/// Presentation-layer collaborator.
pub trait Presenter {
    /// Show the session's current stage and its populated text.
    fn render(&mut self, session: &RecallSession);

    /// Ask for free text.  `None` ends the session.
    fn input(&mut self, request: TextRequest) -> Option<String>;

    /// Ask a yes/no question.  `false` ends the session.
    fn confirm(&mut self, question: Confirmation) -> bool;

    /// Tell the person an operation failed.
    fn report(&mut self, error: &MemoraError);
}

/// Run the recall protocol until the presenter ends it.
///
/// Returns the number of memories revealed.
pub async fn run_session<P: Presenter + ?Sized>(
    machine: &mut RecallSessionMachine,
    presenter: &mut P,
) -> u32 {
    let mut revealed = 0;
    presenter.render(machine.session());

    loop {
        let step = match machine.stage() {
            Stage::Greeting => match presenter.input(TextRequest::Greeting) {
                Some(greeting) => machine.start(&greeting).await.map(drop),
                None => break,
            },
            Stage::RoutineShown => {
                if !presenter.confirm(Confirmation::RecallMemory) {
                    break;
                }
                machine.request_hint().await.map(drop)
            }
            Stage::HintShown => match presenter.input(TextRequest::RecallAttempt) {
                Some(attempt) => {
                    let result = machine.reveal(&attempt).await.map(drop);
                    if result.is_ok() {
                        revealed += 1;
                    }
                    result
                }
                None => break,
            },
            Stage::MemoryRevealed => {
                if !presenter.confirm(Confirmation::AnotherMemory) {
                    break;
                }
                machine.another_memory().await.map(drop)
            }
        };

        match step {
            Ok(()) => presenter.render(machine.session()),
            Err(e) => presenter.report(&e),
        }
    }

    info!(revealed, hints = machine.session().hints_given(), "recall session ended");
    revealed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GenerationError, GenerativeTextGateway};
    use async_trait::async_trait;
    use memora_types::{PersonalRecord, Profile};
    use memora_memory::ProfileAssembler;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NumberedGateway(AtomicUsize);

    #[async_trait]
    impl GenerativeTextGateway for NumberedGateway {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok(format!("text {}", self.0.fetch_add(1, Ordering::SeqCst) + 1))
        }
    }

    /// Replays scripted answers and records what it was shown.
    #[derive(Default)]
    struct ScriptedPresenter {
        texts: VecDeque<Option<String>>,
        confirms: VecDeque<bool>,
        rendered: Vec<Stage>,
        errors: Vec<MemoraError>,
    }

    impl Presenter for ScriptedPresenter {
        fn render(&mut self, session: &RecallSession) {
            self.rendered.push(session.stage());
        }
        fn input(&mut self, _request: TextRequest) -> Option<String> {
            self.texts.pop_front().flatten()
        }
        fn confirm(&mut self, _question: Confirmation) -> bool {
            self.confirms.pop_front().unwrap_or(false)
        }
        fn report(&mut self, error: &MemoraError) {
            self.errors.push(error.clone());
        }
    }

    fn machine() -> RecallSessionMachine {
        let profile: Profile =
            ProfileAssembler::assemble(&PersonalRecord::new().with("name", "Anna"), None);
        RecallSessionMachine::new(Arc::new(profile), Arc::new(NumberedGateway(AtomicUsize::new(0))))
    }

    #[tokio::test]
    async fn scripted_session_runs_two_cycles() {
        let mut presenter = ScriptedPresenter {
            texts: VecDeque::from([
                Some("Good morning".into()),
                Some("the park".into()),
                Some(String::new()),
            ]),
            confirms: VecDeque::from([true, true, false]),
            ..Default::default()
        };
        let mut m = machine();

        let revealed = run_session(&mut m, &mut presenter).await;
        assert_eq!(revealed, 2);
        assert_eq!(
            presenter.rendered,
            [
                Stage::Greeting,
                Stage::RoutineShown,
                Stage::HintShown,
                Stage::MemoryRevealed,
                Stage::HintShown,
                Stage::MemoryRevealed,
            ]
        );
        assert!(presenter.errors.is_empty());
        assert_eq!(m.session().attempt(), Some(""));
    }

    #[tokio::test]
    async fn blank_greeting_is_reported_and_asked_again() {
        let mut presenter = ScriptedPresenter {
            texts: VecDeque::from([Some("   ".into()), Some("Hello".into())]),
            confirms: VecDeque::from([false]),
            ..Default::default()
        };
        let mut m = machine();

        run_session(&mut m, &mut presenter).await;
        assert_eq!(presenter.errors.len(), 1);
        assert!(matches!(presenter.errors[0], MemoraError::InvalidInput(_)));
        assert_eq!(m.stage(), Stage::RoutineShown);
    }

    #[tokio::test]
    async fn ending_input_stops_immediately() {
        let mut presenter = ScriptedPresenter::default();
        let mut m = machine();
        assert_eq!(run_session(&mut m, &mut presenter).await, 0);
        assert_eq!(m.stage(), Stage::Greeting);
        assert_eq!(presenter.rendered, [Stage::Greeting]);
    }
}
