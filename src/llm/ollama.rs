use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ndjson::{WireMessage, decode_chunks};
use super::provider::{
    ChatMessage, ChatRequest, ChunkStream, LlmError, LlmProvider, LlmResult, StructuredRequest,
    ToolDeclaration,
};
use crate::http::client::HttpClient;

const ERROR_BODY_MAX_CHARS: usize = 400;

/// Chat adapter for an Ollama-compatible `/api/chat` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    http: HttpClient,
    model: String,
    base_url: String,
}

impl OllamaProvider {
    pub fn new(http: HttpClient, model: String, base_url: String) -> Self {
        Self {
            http,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        tools: &'a [ToolDeclaration],
        stream: bool,
        format: Option<&'a Value>,
    ) -> OllamaChatRequest<'a> {
        OllamaChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|message| OllamaMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                    tool_name: message.tool_name.as_deref(),
                })
                .collect(),
            stream,
            tools: tools
                .iter()
                .map(|tool| OllamaTool {
                    kind: "function",
                    function: OllamaFunction {
                        name: &tool.name,
                        description: &tool.description,
                        parameters: &tool.parameters_json_schema,
                    },
                })
                .collect(),
            format,
        }
    }
}

impl LlmProvider for OllamaProvider {
    async fn chat_stream(&self, request: ChatRequest) -> LlmResult<ChunkStream> {
        let payload = self.build_request(&request.messages, &request.tools, true, None);
        let resp = self
            .http
            .post_streaming(&self.endpoint(), &payload)
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(LlmError::HttpStatus {
                status,
                body: body.chars().take(ERROR_BODY_MAX_CHARS).collect(),
            });
        }

        Ok(decode_chunks(resp.bytes_stream()).boxed())
    }

    async fn chat_structured(&self, request: StructuredRequest) -> LlmResult<Value> {
        let payload = self.build_request(&request.messages, &[], false, Some(&request.schema));
        let resp = self
            .http
            .post_buffered(&self.endpoint(), &payload)
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        if !(200..300).contains(&resp.status) {
            return Err(LlmError::HttpStatus {
                status: resp.status,
                body: resp.body.chars().take(ERROR_BODY_MAX_CHARS).collect(),
            });
        }

        let parsed = serde_json::from_str::<OllamaChatResponse>(&resp.body)
            .map_err(|err| LlmError::Parse(err.to_string()))?;
        if let Some(message) = parsed.error {
            return Err(LlmError::Provider(message));
        }

        let content = parsed
            .message
            .map(|message| message.content)
            .unwrap_or_default();
        let content = content.trim();
        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        serde_json::from_str(content).map_err(|err| LlmError::Parse(format!("{err}: {content}")))
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a Value>,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct OllamaTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OllamaFunction<'a>,
}

#[derive(Debug, Serialize)]
struct OllamaFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    error: Option<String>,
}
