//! Study session state machine and the controller task that drives it.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use study_buddy::genai::{AnswerEvaluator, QuestionGenerator};
//! # use study_buddy::speech::{SpeechCapture, SpeechPlayback};
//! use study_buddy::session::{new_shared_session, SessionCommand, SessionController};
//! use tokio::sync::mpsc;
//!
//! # async fn example(
//! #     generator: QuestionGenerator,
//! #     evaluator: AnswerEvaluator,
//! #     capture: Arc<dyn SpeechCapture>,
//! #     playback: Arc<dyn SpeechPlayback>,
//! # ) {
//! let session = new_shared_session();
//! let (tx, rx) = mpsc::channel(32);
//! let controller = SessionController::new(session.clone(), generator, evaluator, capture, playback);
//! tokio::spawn(controller.run(rx));
//!
//! tx.send(SessionCommand::StartSession { notes: "…".into() }).await.unwrap();
//! # }
//! ```

pub mod controller;
pub mod state;

pub use controller::{SessionCommand, SessionController, EVALUATING_LABEL, GENERATING_LABEL};
pub use state::{lock, new_shared_session, LoadingState, Session, SharedSession, TransitionError, View};
