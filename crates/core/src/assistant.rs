//! Grounding for the conversational assistant.
//!
//! The assistant answers guest questions from the booklet. It receives the
//! payload disclosed to [`CallerRole::Assistant`]: public content plus the
//! unlisted FAQ entries, never contacts or the Wi-Fi password. Text
//! generation itself is an external [`TextCompleter`].

use async_trait::async_trait;
use serde_json::Value;

use crate::booklet::Booklet;
use crate::disclosure::disclose;
use crate::error::CoreError;
use crate::visibility::CallerRole;

/// Longest question forwarded to the completer, in characters.
pub const MAX_QUESTION_CHARS: usize = 1000;

/// Opaque text-completion collaborator.
#[async_trait]
pub trait TextCompleter: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CoreError>;
}

/// What the assistant may know about one booklet.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantContext {
    content: Value,
}

impl AssistantContext {
    /// `None` when nothing is disclosed, e.g. for an unpublished booklet.
    pub fn for_booklet(booklet: &Booklet) -> Option<Self> {
        let content = disclose(booklet, CallerRole::Assistant);
        match &content {
            Value::Object(map) if map.is_empty() => None,
            _ => Some(Self { content }),
        }
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    pub fn prompt(&self, question: &str) -> String {
        format!(
            "You are the host's assistant for a holiday rental. Answer the guest's \
             question using only the booklet below. If the booklet does not cover it, \
             say so.\n\nBooklet:\n{}\n\nQuestion: {}",
            self.content,
            question.trim()
        )
    }
}

/// Answer `question` about `booklet` through `completer`.
pub async fn answer_question(
    completer: &dyn TextCompleter,
    booklet: &Booklet,
    question: &str,
) -> Result<String, CoreError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(CoreError::Validation("Question must not be empty".to_string()));
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(CoreError::Validation(format!(
            "Question exceeds {MAX_QUESTION_CHARS} characters"
        )));
    }

    let context = AssistantContext::for_booklet(booklet).ok_or(CoreError::UnknownAccessCode)?;
    let answer = completer.complete(&context.prompt(question)).await?;
    tracing::debug!(booklet_id = %booklet.id, answer_len = answer.len(), "Assistant answered");
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booklet::{BookletStatus, Connectivity, Contacts, FaqEntry};
    use crate::patch::SectionPatch;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Records the prompt and echoes a canned answer.
    #[derive(Default)]
    struct RecordingCompleter {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextCompleter for RecordingCompleter {
        async fn complete(&self, prompt: &str) -> Result<String, CoreError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("Behind the shed.".to_string())
        }
    }

    fn published() -> Booklet {
        let mut booklet = Booklet::new(1);
        booklet.identity.property_name = "Villa Mimosa".into();
        booklet.apply(&SectionPatch::Faq(FaqEntry {
            id: Uuid::new_v4(),
            question: "Spare key?".into(),
            answer: "Lockbox behind the shed".into(),
            is_favorite: false,
        }));
        booklet.apply(&SectionPatch::Connectivity(Connectivity {
            ssid: "Mimosa".into(),
            password: "s3cret-wifi".into(),
        }));
        booklet.apply(&SectionPatch::Contacts(Contacts {
            phone: Some("+33600000000".into()),
            email: None,
        }));
        booklet.status = BookletStatus::Published;
        booklet
    }

    #[tokio::test]
    async fn prompt_is_grounded_on_assistant_tier_only() {
        let completer = RecordingCompleter::default();
        let answer = answer_question(&completer, &published(), "  Where is the key? ")
            .await
            .unwrap();
        assert_eq!(answer, "Behind the shed.");

        let prompts = completer.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.contains("Lockbox behind the shed"));
        assert!(prompt.contains("Question: Where is the key?"));
        assert!(!prompt.contains("s3cret-wifi"));
        assert!(!prompt.contains("+33600000000"));
    }

    #[tokio::test]
    async fn unpublished_booklet_has_no_context() {
        let mut booklet = published();
        booklet.status = BookletStatus::Draft;
        assert!(AssistantContext::for_booklet(&booklet).is_none());

        let completer = RecordingCompleter::default();
        assert!(answer_question(&completer, &booklet, "Key?").await.is_err());
        assert!(completer.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn questions_are_validated() {
        let completer = RecordingCompleter::default();
        let booklet = published();
        assert!(answer_question(&completer, &booklet, "   ").await.is_err());
        let long = "?".repeat(MAX_QUESTION_CHARS + 1);
        assert!(answer_question(&completer, &booklet, &long).await.is_err());
    }
}
