//! Prompt builder for question generation and answer evaluation.
//!
//! Both prompts are single user messages. Notes, questions and answers are
//! embedded inside double quotes exactly as supplied.

use serde_json::json;

use crate::genai::wire::Message;

/// Builds the two quiz prompts and the question-list schema hint.
///
/// ```rust
/// use study_buddy::genai::PromptBuilder;
///
/// let builder = PromptBuilder::new(5);
/// let msg = builder.question_prompt("Photosynthesis converts light into chemical energy.");
/// assert!(msg.parts[0].text.contains("exactly 5"));
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    question_count: usize,
}

impl PromptBuilder {
    pub fn new(question_count: usize) -> Self {
        Self { question_count }
    }

    /// Prompt asking for `question_count` varied, open-ended exam questions.
    pub fn question_prompt(&self, notes: &str) -> Message {
        Message::user(format!(
            "Based on the following text, generate exactly {} diverse questions that a student \
             could be asked in an exam. Include a mix of \"what is,\" \"how does,\" and \"why is\" \
             questions. Do not generate multiple-choice questions.\n\nText: \"{}\"",
            self.question_count, notes
        ))
    }

    /// Prompt asking a tutor persona to judge `answer` against `notes`.
    ///
    /// The verdict is requested first so the reply can be classified by its
    /// leading words.
    pub fn evaluation_prompt(&self, notes: &str, question: &str, answer: &str) -> Message {
        Message::user(format!(
            "You are a helpful and encouraging tutor. A student is answering questions based on \
             a text they studied.\n\n\
             Original Text: \"{notes}\"\n\n\
             Question: \"{question}\"\n\n\
             Student's Answer: \"{answer}\"\n\n\
             Please evaluate the student's answer.\n\
             1. Start by stating if the answer is \"Correct\", \"Partially Correct\", or \"Incorrect\".\n\
             2. Provide a brief, clear, and encouraging explanation for your evaluation.\n\
             3. If the answer is not perfect, provide a suggestion for how to improve it, \
             referencing the original text if helpful. Keep the tone positive."
        ))
    }

    /// Response schema: an object with a required `questions` string array.
    pub fn question_schema() -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "questions": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" }
                }
            },
            "required": ["questions"]
        })
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(5)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genai::wire::Role;

    #[test]
    fn question_prompt_embeds_notes_and_count() {
        let builder = PromptBuilder::new(5);
        let msg = builder.question_prompt("Mitochondria are the powerhouse of the cell.");

        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.parts.len(), 1);
        let text = &msg.parts[0].text;
        assert!(text.contains("exactly 5 diverse questions"));
        assert!(text.contains("Do not generate multiple-choice questions."));
        assert!(text.ends_with("Text: \"Mitochondria are the powerhouse of the cell.\""));
    }

    #[test]
    fn question_count_is_configurable() {
        let msg = PromptBuilder::new(3).question_prompt("notes");
        assert!(msg.parts[0].text.contains("exactly 3 diverse"));
    }

    #[test]
    fn evaluation_prompt_contains_all_inputs() {
        let msg = PromptBuilder::default().evaluation_prompt(
            "Plants use chlorophyll.",
            "What do plants use?",
            "chlorophyll",
        );
        let text = &msg.parts[0].text;

        assert!(text.contains("Original Text: \"Plants use chlorophyll.\""));
        assert!(text.contains("Question: \"What do plants use?\""));
        assert!(text.contains("Student's Answer: \"chlorophyll\""));
        assert!(text.contains("\"Correct\", \"Partially Correct\", or \"Incorrect\""));
    }

    #[test]
    fn schema_requires_questions_array() {
        let schema = PromptBuilder::question_schema();
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(schema["properties"]["questions"]["type"], "ARRAY");
        assert_eq!(schema["properties"]["questions"]["items"]["type"], "STRING");
        assert_eq!(schema["required"][0], "questions");
    }
}
