use std::error::Error;
use std::fmt::{Display, Formatter};

use futures::stream::BoxStream;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub tool_name: Option<String>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_name: None,
        }
    }

    pub fn tool(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters_json_schema: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub name: String,
    pub args_json: Value,
}

/// One incremental fragment of a streamed model response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatChunk {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDeclaration>,
}

/// A single non-streamed request whose reply must conform to `schema`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    pub messages: Vec<ChatMessage>,
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    HttpStatus { status: u16, body: String },
    Transport(String),
    Parse(String),
    Provider(String),
    StreamStalled { idle_ms: u64 },
    EmptyResponse,
}

impl Display for LlmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpStatus { status, body } => {
                write!(f, "model request failed with status {status}: {body}")
            }
            Self::Transport(msg) => write!(f, "model transport error: {msg}"),
            Self::Parse(msg) => write!(f, "model parse error: {msg}"),
            Self::Provider(msg) => write!(f, "model reported an error: {msg}"),
            Self::StreamStalled { idle_ms } => {
                write!(f, "model stream produced nothing for {idle_ms} ms")
            }
            Self::EmptyResponse => write!(f, "model returned an empty response"),
        }
    }
}

impl Error for LlmError {}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Ordered, finite, non-restartable sequence of response chunks.
pub type ChunkStream = BoxStream<'static, LlmResult<ChatChunk>>;

pub trait LlmProvider {
    fn chat_stream(
        &self,
        request: ChatRequest,
    ) -> impl std::future::Future<Output = LlmResult<ChunkStream>> + Send;

    fn chat_structured(
        &self,
        request: StructuredRequest,
    ) -> impl std::future::Future<Output = LlmResult<Value>> + Send;
}
