//! Study session value and its named transitions.
//!
//! [`Session`] is the single source of truth for the UI. It is mutated only
//! through the transition methods below; the controller calls them and the
//! egui update loop reads a snapshot each frame through [`SharedSession`].
//!
//! ```text
//! Initial ──enter_quiz──▶ Quiz ──advance (last question)──▶ Complete
//!    ▲                    │  ▲                                  │
//!    │                    └──┘ advance / capture / feedback     │
//!    └────────────────────────────── restart ───────────────────┘
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::genai::Feedback;

// ---------------------------------------------------------------------------
// View / LoadingState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    /// Collecting notes.
    #[default]
    Initial,
    /// Iterating questions.
    Quiz,
    /// All questions answered; waits for restart.
    Complete,
}

/// Set immediately before and cleared immediately after every outbound call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadingState {
    pub active: bool,
    pub label: String,
}

// ---------------------------------------------------------------------------
// TransitionError
// ---------------------------------------------------------------------------

/// A transition was requested whose precondition does not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("another request is already in progress")]
    Busy,

    #[error("not available in the {0:?} view")]
    WrongView(View),

    #[error("no questions to start a quiz with")]
    NoQuestions,

    #[error("the current question has no feedback yet")]
    NoFeedback,

    #[error("already listening for an answer")]
    AlreadyCapturing,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub view: View,
    pub notes: String,
    pub questions: Vec<String>,
    pub current_index: usize,
    pub transcript: String,
    pub feedback: Option<Feedback>,
    pub loading: LoadingState,
    pub error: Option<String>,
    /// A capture session is running.
    pub capturing: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Outbound calls ------------------------------------------------------

    /// Mark an outbound call as in flight. At most one may be outstanding.
    pub fn begin_call(&mut self, label: impl Into<String>) -> Result<(), TransitionError> {
        if self.loading.active {
            return Err(TransitionError::Busy);
        }
        self.loading = LoadingState {
            active: true,
            label: label.into(),
        };
        Ok(())
    }

    pub fn end_call(&mut self) {
        self.loading = LoadingState::default();
    }

    // -- Initial → Quiz ------------------------------------------------------

    /// Store the generated questions and show the first one.
    pub fn enter_quiz(&mut self, notes: String, questions: Vec<String>) -> Result<(), TransitionError> {
        if self.view != View::Initial {
            return Err(TransitionError::WrongView(self.view));
        }
        if questions.is_empty() {
            return Err(TransitionError::NoQuestions);
        }
        self.notes = notes;
        self.questions = questions;
        self.current_index = 0;
        self.transcript.clear();
        self.feedback = None;
        self.view = View::Quiz;
        Ok(())
    }

    // -- Capture -------------------------------------------------------------

    /// Start listening for an answer, clearing the previous transcript and
    /// feedback first.
    pub fn begin_capture(&mut self) -> Result<(), TransitionError> {
        if self.view != View::Quiz {
            return Err(TransitionError::WrongView(self.view));
        }
        if self.loading.active {
            return Err(TransitionError::Busy);
        }
        if self.capturing {
            return Err(TransitionError::AlreadyCapturing);
        }
        self.transcript.clear();
        self.feedback = None;
        self.capturing = true;
        Ok(())
    }

    pub fn end_capture(&mut self) {
        self.capturing = false;
    }

    pub fn record_transcript(&mut self, text: impl Into<String>) {
        self.transcript = text.into();
    }

    pub fn record_feedback(&mut self, feedback: Feedback) {
        self.feedback = Some(feedback);
    }

    // -- Quiz → Quiz / Complete ---------------------------------------------

    /// Advance is offered once the current question has feedback and no
    /// call is in flight.
    pub fn can_advance(&self) -> bool {
        self.view == View::Quiz && self.feedback.is_some() && !self.loading.active && !self.capturing
    }

    pub fn advance(&mut self) -> Result<View, TransitionError> {
        if self.view != View::Quiz {
            return Err(TransitionError::WrongView(self.view));
        }
        if self.loading.active {
            return Err(TransitionError::Busy);
        }
        if self.capturing {
            return Err(TransitionError::AlreadyCapturing);
        }
        if self.feedback.is_none() {
            return Err(TransitionError::NoFeedback);
        }

        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
            self.transcript.clear();
            self.feedback = None;
        } else {
            self.view = View::Complete;
        }
        Ok(self.view)
    }

    // -- Complete → Initial --------------------------------------------------

    pub fn restart(&mut self) -> Result<(), TransitionError> {
        if self.view != View::Complete {
            return Err(TransitionError::WrongView(self.view));
        }
        self.view = View::Initial;
        self.notes.clear();
        self.questions.clear();
        self.current_index = 0;
        self.transcript.clear();
        self.feedback = None;
        self.capturing = false;
        Ok(())
    }

    // -- Errors --------------------------------------------------------------

    pub fn report_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("session: {message}");
        self.error = Some(message);
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    // -- Queries -------------------------------------------------------------

    pub fn current_question(&self) -> Option<&str> {
        match self.view {
            View::Quiz => self.questions.get(self.current_index).map(String::as_str),
            _ => None,
        }
    }

    /// `(1-based position, total)` while in the quiz.
    pub fn progress(&self) -> Option<(usize, usize)> {
        (self.view == View::Quiz).then(|| (self.current_index + 1, self.questions.len()))
    }
}

// ---------------------------------------------------------------------------
// SharedSession
// ---------------------------------------------------------------------------

/// Cheap to clone; do not hold the lock across `.await` points.
pub type SharedSession = Arc<Mutex<Session>>;

pub fn new_shared_session() -> SharedSession {
    Arc::new(Mutex::new(Session::new()))
}

/// Lock the session, recovering the value if a previous holder panicked.
pub fn lock(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
