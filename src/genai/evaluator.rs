//! Spoken-answer evaluation and feedback classification.
//!
//! The evaluator never returns an error: on a failed call it degrades to a
//! placeholder [`Feedback`] tagged [`Classification::EvaluationFailed`] and
//! hands the underlying failure back alongside it, so the quiz can always
//! move on.

use std::sync::Arc;

use crate::genai::client::{GenerativeClient, GenerativeError};
use crate::genai::prompt::PromptBuilder;

/// Placeholder text shown when the evaluation call failed.
pub const EVALUATION_FAILED_TEXT: &str = "Could not evaluate answer.";

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

/// Verdict category derived from the feedback text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Correct,
    PartiallyCorrect,
    Incorrect,
    EvaluationFailed,
}

impl Classification {
    /// Short label for the feedback panel.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Correct => "Correct",
            Classification::PartiallyCorrect => "Partially correct",
            Classification::Incorrect => "Incorrect",
            Classification::EvaluationFailed => "Not evaluated",
        }
    }
}

/// The evaluator's verdict text for one answered question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub text: String,
    pub classification: Classification,
}

impl Feedback {
    /// Wrap model output, classifying it by its leading words.
    pub fn from_model_text(text: String) -> Self {
        let classification = classify(&text);
        Self {
            text,
            classification,
        }
    }

    pub fn evaluation_failed() -> Self {
        Self {
            text: EVALUATION_FAILED_TEXT.to_string(),
            classification: Classification::EvaluationFailed,
        }
    }
}

/// Literal prefix check on the lower-cased text.
///
/// `"correct…"` wins first, then `"partially correct…"`, everything else is
/// incorrect. Leading whitespace or markdown is not stripped, and a reply
/// such as "Incorrect, but partially correct reasoning" lands in
/// `Incorrect`.
pub fn classify(text: &str) -> Classification {
    let lower = text.to_lowercase();
    if lower.starts_with("correct") {
        Classification::Correct
    } else if lower.starts_with("partially correct") {
        Classification::PartiallyCorrect
    } else {
        Classification::Incorrect
    }
}

// ---------------------------------------------------------------------------
// AnswerEvaluator
// ---------------------------------------------------------------------------

/// Outcome of one evaluation: always a feedback, plus the failure when the
/// call did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub feedback: Feedback,
    pub failure: Option<GenerativeError>,
}

pub struct AnswerEvaluator {
    client: Arc<dyn GenerativeClient>,
    prompts: PromptBuilder,
}

impl AnswerEvaluator {
    pub fn new(client: Arc<dyn GenerativeClient>, prompts: PromptBuilder) -> Self {
        Self { client, prompts }
    }

    pub async fn evaluate(&self, notes: &str, question: &str, answer: &str) -> Evaluation {
        let message = self.prompts.evaluation_prompt(notes, question, answer);

        match self.client.send(&[message], None).await {
            Ok(text) => {
                let feedback = Feedback::from_model_text(text);
                log::debug!("evaluator: classified as {:?}", feedback.classification);
                Evaluation {
                    feedback,
                    failure: None,
                }
            }
            Err(e) => {
                log::warn!("evaluator: call failed ({e}), using placeholder feedback");
                Evaluation {
                    feedback: Feedback::evaluation_failed(),
                    failure: Some(e),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genai::client::MockGenerativeClient;

    #[test]
    fn correct_prefix_any_case() {
        assert_eq!(classify("Correct! Great job."), Classification::Correct);
        assert_eq!(classify("CORRECT."), Classification::Correct);
        assert_eq!(classify("correctly identified"), Classification::Correct);
    }

    #[test]
    fn partially_correct_prefix() {
        assert_eq!(
            classify("Partially Correct. You mentioned light but not glucose."),
            Classification::PartiallyCorrect
        );
        assert_eq!(classify("partially correct"), Classification::PartiallyCorrect);
    }

    #[test]
    fn everything_else_is_incorrect() {
        assert_eq!(classify("Incorrect. Review the text."), Classification::Incorrect);
        assert_eq!(classify("Partially right"), Classification::Incorrect);
        assert_eq!(classify("**Correct**"), Classification::Incorrect);
        assert_eq!(classify(" Correct"), Classification::Incorrect);
        assert_eq!(
            classify("Incorrect, but partially correct reasoning"),
            Classification::Incorrect
        );
    }

    #[tokio::test]
    async fn successful_call_yields_classified_feedback() {
        let client = Arc::new(MockGenerativeClient::ok(
            "Correct! Photosynthesis does convert light into chemical energy.",
        ));
        let evaluator = AnswerEvaluator::new(client.clone(), PromptBuilder::default());

        let eval = evaluator
            .evaluate(
                "notes",
                "What does photosynthesis do?",
                "Photosynthesis converts light into chemical energy",
            )
            .await;

        assert_eq!(eval.feedback.classification, Classification::Correct);
        assert!(eval.feedback.text.starts_with("Correct!"));
        assert!(eval.failure.is_none());

        let (messages, hint) = client.call(0);
        assert!(hint.is_none());
        assert!(messages[0].parts[0]
            .text
            .contains("Photosynthesis converts light into chemical energy"));
    }

    #[tokio::test]
    async fn failed_call_degrades_to_placeholder() {
        let client = Arc::new(MockGenerativeClient::err(GenerativeError::Network(
            "connection refused".into(),
        )));
        let evaluator = AnswerEvaluator::new(client, PromptBuilder::default());

        let eval = evaluator.evaluate("notes", "q", "a").await;

        assert_eq!(eval.feedback, Feedback::evaluation_failed());
        assert_eq!(eval.feedback.text, EVALUATION_FAILED_TEXT);
        assert_eq!(
            eval.failure,
            Some(GenerativeError::Network("connection refused".into()))
        );
    }
}
