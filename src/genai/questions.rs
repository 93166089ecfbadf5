//! Question generation from study notes.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::genai::client::{GenerativeClient, GenerativeError};
use crate::genai::prompt::PromptBuilder;

/// Errors from [`QuestionGenerator::generate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionError {
    /// Notes are too short; no request was sent.
    #[error(
        "Please paste a more substantial amount of text (at least {min} characters) for better question generation."
    )]
    InsufficientInput { min: usize, actual: usize },

    /// The reply was not a non-empty `questions` list.
    #[error("The AI failed to generate questions in the expected format.")]
    GenerationFailed,

    #[error(transparent)]
    Generative(#[from] GenerativeError),
}

#[derive(Debug, Deserialize)]
struct QuestionList {
    questions: Vec<String>,
}

/// Turns study notes into an ordered list of quiz questions.
///
/// The list is accepted verbatim as long as it is non-empty; the requested
/// count is not enforced.
pub struct QuestionGenerator {
    client: Arc<dyn GenerativeClient>,
    prompts: PromptBuilder,
    min_notes_chars: usize,
}

impl QuestionGenerator {
    pub fn new(client: Arc<dyn GenerativeClient>, prompts: PromptBuilder, min_notes_chars: usize) -> Self {
        Self {
            client,
            prompts,
            min_notes_chars,
        }
    }

    /// Reject notes shorter than the configured minimum (in characters).
    pub fn check_notes(&self, notes: &str) -> Result<(), QuestionError> {
        let actual = notes.chars().count();
        if actual < self.min_notes_chars {
            return Err(QuestionError::InsufficientInput {
                min: self.min_notes_chars,
                actual,
            });
        }
        Ok(())
    }

    pub async fn generate(&self, notes: &str) -> Result<Vec<String>, QuestionError> {
        self.check_notes(notes)?;

        let message = self.prompts.question_prompt(notes);
        let schema = PromptBuilder::question_schema();
        let text = self.client.send(&[message], Some(&schema)).await?;

        let parsed: QuestionList = serde_json::from_str(&text).map_err(|e| {
            log::warn!("questions: reply is not a question list ({e})");
            QuestionError::GenerationFailed
        })?;

        if parsed.questions.is_empty() {
            log::warn!("questions: model returned an empty list");
            return Err(QuestionError::GenerationFailed);
        }

        log::info!("questions: generated {} question(s)", parsed.questions.len());
        Ok(parsed.questions)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genai::client::MockGenerativeClient;

    const NOTES: &str = "Photosynthesis is the process used by plants, algae and certain bacteria \
                         to turn light energy into chemical energy stored in glucose.";

    fn generator(client: Arc<MockGenerativeClient>) -> QuestionGenerator {
        QuestionGenerator::new(client, PromptBuilder::new(5), 50)
    }

    #[tokio::test]
    async fn short_notes_never_reach_the_client() {
        let client = Arc::new(MockGenerativeClient::ok(r#"{"questions":["q"]}"#));
        let gen = generator(Arc::clone(&client));

        let almost = "x".repeat(49);
        for notes in ["", "short", almost.as_str()] {
            let err = gen.generate(notes).await.unwrap_err();
            assert!(matches!(err, QuestionError::InsufficientInput { min: 50, .. }));
        }
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn length_counts_characters_not_bytes() {
        let client = Arc::new(MockGenerativeClient::ok(r#"{"questions":["q"]}"#));
        let gen = generator(Arc::clone(&client));

        // 25 two-byte characters: 50 bytes but only 25 chars.
        let err = gen.generate(&"é".repeat(25)).await.unwrap_err();
        assert_eq!(err, QuestionError::InsufficientInput { min: 50, actual: 25 });
    }

    #[tokio::test]
    async fn returns_questions_verbatim() {
        let reply = r#"{"questions":["What is photosynthesis?","How does light matter?","Why is glucose stored?","What are algae?","How do bacteria help?"]}"#;
        let client = Arc::new(MockGenerativeClient::ok(reply));
        let gen = generator(Arc::clone(&client));

        let questions = gen.generate(NOTES).await.unwrap();
        assert_eq!(questions.len(), 5);
        assert_eq!(questions[0], "What is photosynthesis?");
        assert_eq!(questions[4], "How do bacteria help?");
    }

    #[tokio::test]
    async fn sends_one_message_with_schema_hint() {
        let client = Arc::new(MockGenerativeClient::ok(r#"{"questions":["q"]}"#));
        let gen = generator(Arc::clone(&client));
        gen.generate(NOTES).await.unwrap();

        let (messages, hint) = client.call(0);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].parts[0].text.contains(NOTES));
        assert_eq!(hint, Some(PromptBuilder::question_schema()));
    }

    #[tokio::test]
    async fn fewer_questions_than_requested_are_accepted() {
        let client = Arc::new(MockGenerativeClient::ok(r#"{"questions":["only one"]}"#));
        let questions = generator(client).generate(NOTES).await.unwrap();
        assert_eq!(questions, vec!["only one".to_string()]);
    }

    #[tokio::test]
    async fn empty_list_is_generation_failed() {
        let client = Arc::new(MockGenerativeClient::ok(r#"{"questions":[]}"#));
        assert_eq!(
            generator(client).generate(NOTES).await.unwrap_err(),
            QuestionError::GenerationFailed
        );
    }

    #[tokio::test]
    async fn unparseable_reply_is_generation_failed() {
        let client = Arc::new(MockGenerativeClient::ok("1. What is photosynthesis?"));
        assert_eq!(
            generator(client).generate(NOTES).await.unwrap_err(),
            QuestionError::GenerationFailed
        );
    }

    #[tokio::test]
    async fn client_failures_pass_through() {
        let client = Arc::new(MockGenerativeClient::err(GenerativeError::RequestFailed {
            status: 429,
        }));
        assert_eq!(
            generator(client).generate(NOTES).await.unwrap_err(),
            QuestionError::Generative(GenerativeError::RequestFailed { status: 429 })
        );
    }
}
