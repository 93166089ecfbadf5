//! Generative-language module for StudyBuddy.
//!
//! This module provides:
//! * [`GenerativeClient`]: async trait for one request/response call.
//! * [`GeminiClient`]: Gemini `generateContent` over HTTPS.
//! * [`PromptBuilder`]: question and evaluation prompts, question schema.
//! * [`QuestionGenerator`]: notes → list of questions.
//! * [`AnswerEvaluator`]: (notes, question, answer) → [`Feedback`].
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use study_buddy::config::AppConfig;
//! use study_buddy::genai::{GeminiClient, GenerativeClient, PromptBuilder, QuestionGenerator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let client: Arc<dyn GenerativeClient> = Arc::new(GeminiClient::from_config(&config.generative));
//!     let generator = QuestionGenerator::new(
//!         client,
//!         PromptBuilder::new(config.quiz.question_count),
//!         config.quiz.min_notes_chars,
//!     );
//!
//!     let questions = generator
//!         .generate("Photosynthesis is the process used by plants to turn light into glucose.")
//!         .await
//!         .unwrap();
//!     println!("{questions:?}");
//! }
//! ```

pub mod client;
pub mod evaluator;
pub mod prompt;
pub mod questions;
pub mod wire;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{interpret_response, GeminiClient, GenerativeClient, GenerativeError};
pub use evaluator::{classify, AnswerEvaluator, Classification, Evaluation, Feedback};
pub use prompt::PromptBuilder;
pub use questions::{QuestionError, QuestionGenerator};
pub use wire::{Message, Part, Role};

#[cfg(test)]
pub use client::MockGenerativeClient;
