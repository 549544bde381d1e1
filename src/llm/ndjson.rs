use std::fmt::Display;
use std::pin::Pin;

use futures::{Stream, StreamExt, stream};
use serde::Deserialize;
use serde_json::Value;

use super::provider::{ChatChunk, LlmError, LlmResult, ToolCallRequest};

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireMessage {
    #[serde(default)]
    pub(super) content: String,
    #[serde(default)]
    pub(super) tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireToolCall {
    pub(super) function: WireFunction,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireFunction {
    pub(super) name: String,
    #[serde(default)]
    pub(super) arguments: Value,
}

struct DecodeState<S> {
    bytes: Pin<Box<S>>,
    // Raw bytes so a multi-byte character split across reads is never mangled.
    buffer: Vec<u8>,
    finished: bool,
}

impl<S> DecodeState<S> {
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buffer.iter().position(|byte| *byte == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        Some(line)
    }
}

/// Decodes a newline-delimited JSON byte stream into chat chunks, in arrival order.
pub(crate) fn decode_chunks<S, B, E>(bytes: S) -> impl Stream<Item = LlmResult<ChatChunk>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.take_line() {
                match parse_line(&line) {
                    Ok(Some(chunk)) => return Some((Ok(chunk), state)),
                    Ok(None) => continue,
                    Err(err) => {
                        state.finished = true;
                        state.buffer.clear();
                        return Some((Err(err), state));
                    }
                }
            }

            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => state.buffer.extend_from_slice(bytes.as_ref()),
                Some(Err(err)) => {
                    state.finished = true;
                    state.buffer.clear();
                    return Some((Err(LlmError::Transport(err.to_string())), state));
                }
                None => {
                    state.finished = true;
                    if !state.buffer.is_empty() {
                        state.buffer.push(b'\n');
                    }
                }
            }
        }
    })
}

fn parse_line(line: &[u8]) -> LlmResult<Option<ChatChunk>> {
    let text = std::str::from_utf8(line).map_err(|err| LlmError::Parse(err.to_string()))?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let wire = serde_json::from_str::<WireChunk>(text)
        .map_err(|err| LlmError::Parse(format!("{err}: {text}")))?;
    if let Some(message) = wire.error {
        return Err(LlmError::Provider(message));
    }

    let (content, tool_calls) = match wire.message {
        Some(message) => (message.content, convert_tool_calls(message.tool_calls)),
        None => (String::new(), Vec::new()),
    };

    Ok(Some(ChatChunk {
        content,
        tool_calls,
        done: wire.done,
    }))
}

pub(super) fn convert_tool_calls(calls: Option<Vec<WireToolCall>>) -> Vec<ToolCallRequest> {
    calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCallRequest {
            name: call.function.name,
            args_json: call.function.arguments,
        })
        .collect()
}
