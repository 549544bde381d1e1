use std::error::Error;
use std::fmt::{Display, Formatter};

use serde::Deserialize;
use serde_json::{Value, json};

use crate::agent::prompt::{CLASSIFIER_SYSTEM_PROMPT, EXTRACTOR_SYSTEM_PROMPT};
use crate::llm::provider::{ChatMessage, ChatRole, LlmError, LlmProvider, StructuredRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub relevant: bool,
    /// Diagnostic only.
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentError {
    Llm(LlmError),
    Schema(String),
    TimedOut { after_ms: u64 },
}

impl Display for IntentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Llm(err) => write!(f, "{err}"),
            Self::Schema(msg) => write!(f, "reply did not match schema: {msg}"),
            Self::TimedOut { after_ms } => write!(f, "no reply within {after_ms} ms"),
        }
    }
}

impl Error for IntentError {}

impl From<LlmError> for IntentError {
    fn from(value: LlmError) -> Self {
        Self::Llm(value)
    }
}

/// Decides whether the current topic needs the favorite-food capability.
pub trait SubjectClassifier {
    fn classify(
        &self,
        window: &[ChatMessage],
    ) -> impl std::future::Future<Output = Result<Classification, IntentError>> + Send;
}

/// Pulls the subject person's name out of one utterance. `Ok(None)` is a normal outcome.
pub trait EntityExtractor {
    fn extract(
        &self,
        utterance: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, IntentError>> + Send;
}

#[derive(Debug, Deserialize)]
struct ClassifierReply {
    is_food_subject: bool,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct ExtractorReply {
    #[serde(default)]
    name: Option<String>,
}

fn classifier_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "is_food_subject": {"type": "boolean"},
            "reason": {"type": "string"}
        },
        "required": ["is_food_subject", "reason"]
    })
}

fn extractor_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "reason": {"type": "string"}
        },
        "required": ["reason"]
    })
}

/// Structured-output classifier backed by the chat model.
#[derive(Debug, Clone)]
pub struct LlmSubjectClassifier<P> {
    provider: P,
}

impl<P> LlmSubjectClassifier<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: LlmProvider + Sync> SubjectClassifier for LlmSubjectClassifier<P> {
    async fn classify(&self, window: &[ChatMessage]) -> Result<Classification, IntentError> {
        let mut messages = Vec::with_capacity(window.len() + 1);
        messages.push(ChatMessage::new(ChatRole::System, CLASSIFIER_SYSTEM_PROMPT));
        messages.extend_from_slice(window);

        let value = self
            .provider
            .chat_structured(StructuredRequest {
                messages,
                schema: classifier_schema(),
            })
            .await?;
        let reply = serde_json::from_value::<ClassifierReply>(value)
            .map_err(|err| IntentError::Schema(err.to_string()))?;

        Ok(Classification {
            relevant: reply.is_food_subject,
            rationale: reply.reason,
        })
    }
}

/// Structured-output name extractor backed by the chat model.
#[derive(Debug, Clone)]
pub struct LlmEntityExtractor<P> {
    provider: P,
}

impl<P> LlmEntityExtractor<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: LlmProvider + Sync> EntityExtractor for LlmEntityExtractor<P> {
    async fn extract(&self, utterance: &str) -> Result<Option<String>, IntentError> {
        let value = self
            .provider
            .chat_structured(StructuredRequest {
                messages: vec![
                    ChatMessage::new(ChatRole::System, EXTRACTOR_SYSTEM_PROMPT),
                    ChatMessage::new(ChatRole::User, utterance),
                ],
                schema: extractor_schema(),
            })
            .await?;
        let reply = serde_json::from_value::<ExtractorReply>(value)
            .map_err(|err| IntentError::Schema(err.to_string()))?;

        Ok(reply
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()))
    }
}
