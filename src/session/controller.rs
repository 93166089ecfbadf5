//! Session controller: the single task that mutates the [`Session`].
//!
//! # Architecture
//!
//! ```text
//! UI ──SessionCommand──▶ mpsc ──┐
//!                               ├─▶ SessionController::run ──▶ SharedSession
//! CaptureSession events ────────┘      │          │
//!                                      ▼          ▼
//!                             QuestionGenerator  AnswerEvaluator
//! ```
//!
//! Commands and capture events are handled one at a time. Outbound calls are
//! awaited inline, so at most one is ever outstanding; the loading flag is
//! cleared on both the success and failure path before the outcome is
//! applied.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::genai::{AnswerEvaluator, QuestionGenerator};
use crate::session::state::{lock, SharedSession, View};
use crate::speech::{CaptureEvent, CaptureSession, PlaybackError, SpeechCapture, SpeechPlayback};

pub const GENERATING_LABEL: &str = "Generating questions from your notes...";
pub const EVALUATING_LABEL: &str = "Evaluating your answer...";

// ---------------------------------------------------------------------------
// SessionCommand
// ---------------------------------------------------------------------------

/// User intents sent from the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Generate questions from `notes` and enter the quiz.
    StartSession { notes: String },
    /// Start listening, or stop the capture in progress.
    ToggleCapture,
    /// Move to the next question, or to the summary after the last one.
    Advance,
    /// Return to note entry from the summary.
    Restart,
    /// Read the current feedback aloud.
    SpeakFeedback,
    DismissError,
}

enum Step {
    Command(Option<SessionCommand>),
    Capture(CaptureEvent),
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

pub struct SessionController {
    state: SharedSession,
    generator: QuestionGenerator,
    evaluator: AnswerEvaluator,
    capture: Arc<dyn SpeechCapture>,
    playback: Arc<dyn SpeechPlayback>,
    active_capture: Option<CaptureSession>,
}

impl SessionController {
    pub fn new(
        state: SharedSession,
        generator: QuestionGenerator,
        evaluator: AnswerEvaluator,
        capture: Arc<dyn SpeechCapture>,
        playback: Arc<dyn SpeechPlayback>,
    ) -> Self {
        Self {
            state,
            generator,
            evaluator,
            capture,
            playback,
            active_capture: None,
        }
    }

    /// Process commands until the channel closes.
    ///
    /// Spawn this as a tokio task from `main()`.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        loop {
            let step = tokio::select! {
                command = commands.recv() => Step::Command(command),
                event = next_capture_event(&mut self.active_capture) => Step::Capture(event),
            };

            match step {
                Step::Command(Some(command)) => self.handle_command(command).await,
                Step::Command(None) => break,
                Step::Capture(event) => self.handle_capture_event(event).await,
            }
        }

        if let Some(session) = self.active_capture.take() {
            session.stop();
        }
        self.playback.cancel();
        log::info!("session: command channel closed, controller shutting down");
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    async fn handle_command(&mut self, command: SessionCommand) {
        log::debug!("session: {command:?}");
        match command {
            SessionCommand::StartSession { notes } => self.start_session(notes).await,
            SessionCommand::ToggleCapture => self.toggle_capture(),
            SessionCommand::Advance => {
                if let Err(e) = lock(&self.state).advance() {
                    log::debug!("session: advance ignored ({e})");
                }
            }
            SessionCommand::Restart => self.restart(),
            SessionCommand::SpeakFeedback => self.speak_feedback(),
            SessionCommand::DismissError => lock(&self.state).dismiss_error(),
        }
    }

    async fn start_session(&mut self, notes: String) {
        {
            let mut st = lock(&self.state);
            if st.view != View::Initial {
                log::debug!("session: start ignored in {:?} view", st.view);
                return;
            }
            if let Err(e) = self.generator.check_notes(&notes) {
                st.report_error(e.to_string());
                return;
            }
            if let Err(e) = st.begin_call(GENERATING_LABEL) {
                log::debug!("session: start ignored ({e})");
                return;
            }
            st.dismiss_error();
        }

        let result = self.generator.generate(&notes).await;

        let mut st = lock(&self.state);
        st.end_call();
        match result {
            Ok(questions) => {
                let count = questions.len();
                match st.enter_quiz(notes, questions) {
                    Ok(()) => log::info!("session: quiz started with {count} question(s)"),
                    Err(e) => st.report_error(format!("Failed to generate questions. {e}")),
                }
            }
            Err(e) => st.report_error(format!("Failed to generate questions. {e}")),
        }
    }

    fn toggle_capture(&mut self) {
        if let Some(session) = &self.active_capture {
            log::debug!("session: stopping capture");
            session.stop();
            return;
        }

        if let Err(e) = lock(&self.state).begin_capture() {
            log::debug!("session: capture ignored ({e})");
            return;
        }
        self.playback.cancel();

        match self.capture.start() {
            Ok(session) => self.active_capture = Some(session),
            Err(e) => {
                let mut st = lock(&self.state);
                st.end_capture();
                st.report_error(e.to_string());
            }
        }
    }

    fn restart(&mut self) {
        if let Some(session) = self.active_capture.take() {
            session.stop();
        }
        self.playback.cancel();
        if let Err(e) = lock(&self.state).restart() {
            log::debug!("session: restart ignored ({e})");
        }
    }

    fn speak_feedback(&self) {
        let text = lock(&self.state).feedback.as_ref().map(|f| f.text.clone());
        let result = match text {
            Some(text) => self.playback.speak(&text),
            None => Err(PlaybackError::EmptyText),
        };
        if let Err(e) = result {
            lock(&self.state).report_error(e.to_string());
        }
    }

    // -----------------------------------------------------------------------
    // Capture events
    // -----------------------------------------------------------------------

    async fn handle_capture_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::TranscriptReady(text) => {
                self.finish_capture();
                self.evaluate(text).await;
            }
            CaptureEvent::CaptureError(e) => {
                self.finish_capture();
                lock(&self.state).report_error(e.to_string());
            }
            CaptureEvent::CaptureEnded => self.finish_capture(),
        }
    }

    /// Drop the session, which releases its subscription.
    fn finish_capture(&mut self) {
        self.active_capture = None;
        lock(&self.state).end_capture();
    }

    async fn evaluate(&mut self, transcript: String) {
        let (notes, question) = {
            let mut st = lock(&self.state);
            st.record_transcript(transcript.clone());
            let Some(question) = st.current_question().map(str::to_owned) else {
                return;
            };
            if let Err(e) = st.begin_call(EVALUATING_LABEL) {
                log::debug!("session: evaluation skipped ({e})");
                return;
            }
            (st.notes.clone(), question)
        };

        let evaluation = self.evaluator.evaluate(&notes, &question, &transcript).await;

        let mut st = lock(&self.state);
        st.end_call();
        st.record_feedback(evaluation.feedback);
        if let Some(e) = evaluation.failure {
            st.report_error(format!("Failed to evaluate the answer. {e}"));
        }
    }
}

/// Next event of the active capture, or pending forever when idle.
async fn next_capture_event(active: &mut Option<CaptureSession>) -> CaptureEvent {
    match active {
        Some(session) => session
            .next_event()
            .await
            .unwrap_or(CaptureEvent::CaptureEnded),
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
