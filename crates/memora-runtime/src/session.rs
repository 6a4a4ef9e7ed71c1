//! [`RecallSessionMachine`] – the four-stage recall protocol.
//!
//! ```text
//! Greeting --start(greeting)--> RoutineShown --request_hint()--> HintShown
//! HintShown --reveal(attempt)--> MemoryRevealed --another_memory()--> HintShown
//! ```
//!
//! There is no terminal stage: hint/reveal cycles can repeat until the
//! caller drops the machine.  Every operation is all-or-nothing.  When it
//! fails (wrong stage, blank greeting, generation error) the stage and every
//! text field are exactly as they were before the call, so the caller may
//! simply retry.
//!
//! Operations take `&mut self`, so one session can never run two operations
//! at once.  Independent sessions share nothing but the read-only
//! [`Profile`].

use std::sync::Arc;

use memora_types::{MemoraError, Operation, Profile, Stage};
use tracing::{debug, info, warn};

use crate::gateway::GenerativeTextGateway;
use crate::prompts;

// ─────────────────────────────────────────────────────────────────────────────
// RecallSession
// ─────────────────────────────────────────────────────────────────────────────

/// Live state of one recall session, as read by the presentation layer.
#[derive(Debug, Clone)]
pub struct RecallSession {
    stage: Stage,
    profile: Arc<Profile>,
    greeting: Option<String>,
    routine: Option<String>,
    hint: Option<String>,
    attempt: Option<String>,
    reveal: Option<String>,
    hints_given: u32,
}

impl RecallSession {
    fn new(profile: Arc<Profile>) -> Self {
        Self {
            stage: Stage::Greeting,
            profile,
            greeting: None,
            routine: None,
            hint: None,
            attempt: None,
            reveal: None,
            hints_given: 0,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn greeting(&self) -> Option<&str> {
        self.greeting.as_deref()
    }

    pub fn routine(&self) -> Option<&str> {
        self.routine.as_deref()
    }

    /// The most recent hint.
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// The person's most recent recall attempt, verbatim.
    pub fn attempt(&self) -> Option<&str> {
        self.attempt.as_deref()
    }

    /// The most recent reveal.
    pub fn reveal(&self) -> Option<&str> {
        self.reveal.as_deref()
    }

    /// Number of hint cycles started in this session.
    pub fn hints_given(&self) -> u32 {
        self.hints_given
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RecallSessionMachine
// ─────────────────────────────────────────────────────────────────────────────

/// Drives one [`RecallSession`] through its stages.
pub struct RecallSessionMachine {
    session: RecallSession,
    gateway: Arc<dyn GenerativeTextGateway>,
}

impl RecallSessionMachine {
    /// Start a new session in [`Stage::Greeting`] for a fixed `profile`.
    pub fn new(profile: Arc<Profile>, gateway: Arc<dyn GenerativeTextGateway>) -> Self {
        Self {
            session: RecallSession::new(profile),
            gateway,
        }
    }

    pub fn session(&self) -> &RecallSession {
        &self.session
    }

    pub fn stage(&self) -> Stage {
        self.session.stage
    }

    fn require(&self, expected: Stage, attempted: Operation) -> Result<(), MemoraError> {
        if self.session.stage == expected {
            Ok(())
        } else {
            warn!(from = %self.session.stage, %attempted, "rejected session transition");
            Err(MemoraError::InvalidTransition {
                from: self.session.stage,
                attempted,
            })
        }
    }

    async fn generate(&self, prompt: &str, operation: Operation) -> Result<String, MemoraError> {
        debug!(%operation, "requesting generation");
        self.gateway.generate(prompt).await.map_err(|e| {
            warn!(%operation, error = %e, "generation failed; session stage unchanged");
            MemoraError::from(e)
        })
    }

    /// Greet the assistant and receive the daily routine.
    ///
    /// # Errors
    ///
    /// [`MemoraError::InvalidTransition`] outside [`Stage::Greeting`],
    /// [`MemoraError::InvalidInput`] for a blank greeting, and
    /// [`MemoraError::Generation`] if the model call fails.
    pub async fn start(&mut self, greeting: &str) -> Result<&str, MemoraError> {
        self.require(Stage::Greeting, Operation::Start)?;
        if greeting.trim().is_empty() {
            return Err(MemoraError::InvalidInput("greeting must not be empty".into()));
        }

        let prompt = prompts::routine_prompt(&self.session.profile);
        let routine = self.generate(&prompt, Operation::Start).await?;

        self.session.greeting = Some(greeting.to_string());
        self.session.stage = Stage::RoutineShown;
        info!(stage = %self.session.stage, "daily routine shown");
        Ok(self.session.routine.insert(routine).as_str())
    }

    /// Ask for a hint toward a memory.  Valid only after the routine is shown.
    pub async fn request_hint(&mut self) -> Result<&str, MemoraError> {
        self.require(Stage::RoutineShown, Operation::RequestHint)?;
        self.next_hint(Operation::RequestHint).await
    }

    /// Submit the person's recall attempt (may be empty) and reveal the memory.
    pub async fn reveal(&mut self, attempt: &str) -> Result<&str, MemoraError> {
        self.require(Stage::HintShown, Operation::Reveal)?;

        let prompt = prompts::reveal_prompt(&self.session.profile, attempt);
        let reveal = self.generate(&prompt, Operation::Reveal).await?;

        self.session.attempt = Some(attempt.to_string());
        self.session.stage = Stage::MemoryRevealed;
        info!(stage = %self.session.stage, attempted = !attempt.trim().is_empty(), "memory revealed");
        Ok(self.session.reveal.insert(reveal).as_str())
    }

    /// Start a fresh hint cycle after a reveal.
    pub async fn another_memory(&mut self) -> Result<&str, MemoraError> {
        self.require(Stage::MemoryRevealed, Operation::AnotherMemory)?;
        self.next_hint(Operation::AnotherMemory).await
    }

    async fn next_hint(&mut self, operation: Operation) -> Result<&str, MemoraError> {
        let prompt = prompts::hint_prompt(&self.session.profile);
        let hint = self.generate(&prompt, operation).await?;

        self.session.stage = Stage::HintShown;
        self.session.hints_given += 1;
        info!(stage = %self.session.stage, cycle = self.session.hints_given, "hint shown");
        Ok(self.session.hint.insert(hint).as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GenerationError;
    use async_trait::async_trait;
    use memora_types::PersonalRecord;
    use memora_memory::ProfileAssembler;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns `"reply #N"` for the N-th call.
    #[derive(Default)]
    struct CountingGateway {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerativeTextGateway for CountingGateway {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("reply #{n}"))
        }
    }

    /// Always fails.
    struct FailingGateway;

    #[async_trait]
    impl GenerativeTextGateway for FailingGateway {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::EmptyResponse)
        }
    }

    /// Fails the first call only.
    #[derive(Default)]
    struct FlakyGateway {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerativeTextGateway for FlakyGateway {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(GenerationError::BadResponse("hiccup".into()))
            } else {
                Ok("recovered".into())
            }
        }
    }

    fn profile() -> Arc<Profile> {
        let personal = PersonalRecord::new().with("name", "Anna").with("hobby", "gardening");
        Arc::new(ProfileAssembler::assemble(&personal, None))
    }

    fn machine(gateway: Arc<dyn GenerativeTextGateway>) -> RecallSessionMachine {
        RecallSessionMachine::new(profile(), gateway)
    }

    #[test]
    fn new_session_starts_in_greeting() {
        let m = machine(Arc::new(CountingGateway::default()));
        assert_eq!(m.stage(), Stage::Greeting);
        assert!(m.session().routine().is_none());
        assert_eq!(m.session().hints_given(), 0);
    }

    #[tokio::test]
    async fn blank_greeting_is_invalid_input() {
        let gateway = Arc::new(CountingGateway::default());
        let mut m = machine(gateway.clone());
        for greeting in ["", "   ", "\t\n"] {
            let err = m.start(greeting).await.unwrap_err();
            assert!(matches!(err, MemoraError::InvalidInput(_)));
        }
        assert_eq!(m.stage(), Stage::Greeting);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn start_shows_routine() {
        let gateway = Arc::new(CountingGateway::default());
        let mut m = machine(gateway.clone());
        let routine = m.start("Good morning").await.unwrap().to_string();
        assert_eq!(routine, "reply #1");
        assert_eq!(m.stage(), Stage::RoutineShown);
        assert_eq!(m.session().greeting(), Some("Good morning"));
        assert_eq!(m.session().routine(), Some("reply #1"));
        assert!(gateway.prompts.lock().unwrap()[0].contains("daily routine"));
    }

    #[tokio::test]
    async fn reveal_before_hint_is_invalid_transition() {
        let mut m = machine(Arc::new(CountingGateway::default()));
        let err = m.reveal("a park").await.unwrap_err();
        assert_eq!(
            err,
            MemoraError::InvalidTransition { from: Stage::Greeting, attempted: Operation::Reveal }
        );
        assert_eq!(m.stage(), Stage::Greeting);

        m.start("Hello").await.unwrap();
        let err = m.reveal("a park").await.unwrap_err();
        assert_eq!(
            err,
            MemoraError::InvalidTransition { from: Stage::RoutineShown, attempted: Operation::Reveal }
        );
        assert_eq!(m.stage(), Stage::RoutineShown);
        assert!(m.session().attempt().is_none());
    }

    #[tokio::test]
    async fn out_of_order_operations_are_rejected() {
        let mut m = machine(Arc::new(CountingGateway::default()));
        assert!(matches!(
            m.request_hint().await,
            Err(MemoraError::InvalidTransition { attempted: Operation::RequestHint, .. })
        ));
        assert!(matches!(
            m.another_memory().await,
            Err(MemoraError::InvalidTransition { attempted: Operation::AnotherMemory, .. })
        ));
        m.start("Hi").await.unwrap();
        assert!(matches!(
            m.start("Hi again").await,
            Err(MemoraError::InvalidTransition { from: Stage::RoutineShown, attempted: Operation::Start })
        ));
    }

    #[tokio::test]
    async fn full_cycle_and_another_memory_fetches_fresh_hint() {
        let gateway = Arc::new(CountingGateway::default());
        let mut m = machine(gateway.clone());

        m.start("Good morning").await.unwrap();
        let first_hint = m.request_hint().await.unwrap().to_string();
        assert_eq!(m.stage(), Stage::HintShown);

        let reveal = m.reveal("the garden").await.unwrap().to_string();
        assert_eq!(reveal, "reply #3");
        assert_eq!(m.stage(), Stage::MemoryRevealed);
        assert_eq!(m.session().attempt(), Some("the garden"));

        let second_hint = m.another_memory().await.unwrap().to_string();
        assert_eq!(m.stage(), Stage::HintShown);
        assert_ne!(first_hint, second_hint);
        assert_eq!(second_hint, "reply #4");
        assert_eq!(m.session().hints_given(), 2);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 4);

        let prompts = gateway.prompts.lock().unwrap();
        assert!(prompts[2].contains("\"the garden\""));
        assert!(prompts[3].contains("Do not reveal the memory directly"));
    }

    #[tokio::test]
    async fn empty_attempt_is_accepted() {
        let mut m = machine(Arc::new(CountingGateway::default()));
        m.start("Hello").await.unwrap();
        m.request_hint().await.unwrap();
        m.reveal("").await.unwrap();
        assert_eq!(m.stage(), Stage::MemoryRevealed);
        assert_eq!(m.session().attempt(), Some(""));
    }

    #[tokio::test]
    async fn generation_failure_leaves_state_untouched() {
        let mut m = machine(Arc::new(FailingGateway));
        let err = m.start("Good morning").await.unwrap_err();
        assert!(matches!(err, MemoraError::Generation(_)));
        assert_eq!(m.stage(), Stage::Greeting);
        assert!(m.session().greeting().is_none());
        assert!(m.session().routine().is_none());
    }

    #[tokio::test]
    async fn failed_reveal_does_not_record_attempt_and_can_retry() {
        let gateway = Arc::new(CountingGateway::default());
        let mut m = machine(gateway);
        m.start("Hello").await.unwrap();
        m.request_hint().await.unwrap();

        // Swap in a gateway that fails once, then succeeds.
        m.gateway = Arc::new(FlakyGateway::default());
        assert!(m.reveal("the lake").await.is_err());
        assert_eq!(m.stage(), Stage::HintShown);
        assert!(m.session().attempt().is_none());
        assert!(m.session().reveal().is_none());

        assert_eq!(m.reveal("the lake").await.unwrap(), "recovered");
        assert_eq!(m.stage(), Stage::MemoryRevealed);
        assert_eq!(m.session().attempt(), Some("the lake"));
    }

    #[tokio::test]
    async fn failed_another_memory_keeps_revealed_stage() {
        let mut m = machine(Arc::new(CountingGateway::default()));
        m.start("Hello").await.unwrap();
        m.request_hint().await.unwrap();
        m.reveal("?").await.unwrap();
        let hint_before = m.session().hint().map(String::from);

        m.gateway = Arc::new(FailingGateway);
        assert!(m.another_memory().await.is_err());
        assert_eq!(m.stage(), Stage::MemoryRevealed);
        assert_eq!(m.session().hint().map(String::from), hint_before);
        assert_eq!(m.session().hints_given(), 1);
    }

    #[tokio::test]
    async fn sessions_share_only_the_profile() {
        let profile = profile();
        let gateway: Arc<dyn GenerativeTextGateway> = Arc::new(CountingGateway::default());
        let mut a = RecallSessionMachine::new(profile.clone(), gateway.clone());
        let b = RecallSessionMachine::new(profile.clone(), gateway);
        a.start("Hi").await.unwrap();
        assert_eq!(a.stage(), Stage::RoutineShown);
        assert_eq!(b.stage(), Stage::Greeting);
        assert_eq!(a.session().profile(), b.session().profile());
    }
}
