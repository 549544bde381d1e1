use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::time::timeout;

use crate::agent::commands::ControlCommand;
use crate::agent::dispatch::{ToolCallPlan, plan_call, tool_declarations, tool_turn_text};
use crate::agent::intent::{EntityExtractor, IntentError, SubjectClassifier};
use crate::agent::prompt::{food_found_fact, food_unknown_fact};
use crate::agent::stream::ChunkAssembler;
use crate::agent::transcript::Transcript;
use crate::capability::{CapabilityProvider, CapabilityResult};
use crate::config::ToolMode;
use crate::llm::provider::{
    ChatRequest, LlmError, LlmProvider, LlmResult, ToolCallRequest, ToolDeclaration,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub tool_mode: ToolMode,
    pub history_window: usize,
    pub capability_timeout_ms: u64,
    /// Longest wait for any model answer: a classifier or extractor reply,
    /// the start of a stream, or the next chunk of one.
    pub stream_idle_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tool_mode: ToolMode::Classifier,
            history_window: 5,
            capability_timeout_ms: 5_000,
            stream_idle_timeout_ms: 60_000,
        }
    }
}

/// Progress reported while one turn runs. `Chunk` carries display text; the
/// rest are diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Chunk(String),
    Classified { relevant: bool, rationale: String },
    ClassificationFailed(String),
    SubjectExtracted(Option<String>),
    ExtractionFailed(String),
    ToolRequested { name: String, args_json: Value },
    CapabilityResolved { subject: String, result: CapabilityResult },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Cleared,
    DiagnosticsToggled(bool),
    Replied(String),
}

enum StreamedReply {
    Text(String),
    ToolCalls(Vec<ToolCallRequest>),
}

/// One conversation: owns the transcript and drives each turn end to end.
pub struct ChatSession<P, C, K, E> {
    provider: P,
    capability: C,
    classifier: K,
    extractor: E,
    config: SessionConfig,
    transcript: Transcript,
    diagnostics: bool,
}

impl<P, C, K, E> ChatSession<P, C, K, E>
where
    P: LlmProvider,
    C: CapabilityProvider,
    K: SubjectClassifier,
    E: EntityExtractor,
{
    pub fn new(
        provider: P,
        capability: C,
        classifier: K,
        extractor: E,
        system_prompt: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        Self {
            provider,
            capability,
            classifier,
            extractor,
            config,
            transcript: Transcript::new(system_prompt),
            diagnostics: false,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn diagnostics(&self) -> bool {
        self.diagnostics
    }

    /// Runs one line of user input. A model failure returns `Err` and leaves the
    /// transcript at its last committed turn; no partial reply is appended.
    pub async fn submit<F: FnMut(SessionEvent)>(
        &mut self,
        line: &str,
        on_event: &mut F,
    ) -> LlmResult<TurnOutcome> {
        if let Some(command) = ControlCommand::parse(line) {
            return Ok(match command {
                ControlCommand::Clean => {
                    self.transcript.clear();
                    TurnOutcome::Cleared
                }
                ControlCommand::Debug => {
                    self.diagnostics = !self.diagnostics;
                    TurnOutcome::DiagnosticsToggled(self.diagnostics)
                }
            });
        }

        self.transcript.push_user(line);
        let reply = match self.config.tool_mode {
            ToolMode::Classifier => {
                self.inject_capability_fact(line, on_event).await;
                self.stream_reply(Vec::new(), on_event).await?.into_text()
            }
            ToolMode::Native => self.run_native_tools(on_event).await?,
        };

        self.transcript.push_assistant(reply.clone());
        Ok(TurnOutcome::Replied(reply))
    }

    // Classifier and extractor failures skip the lookup; they never fail the turn.
    async fn inject_capability_fact<F: FnMut(SessionEvent)>(
        &mut self,
        utterance: &str,
        on_event: &mut F,
    ) {
        let limit = self.model_wait();
        let window = self.transcript.recent_window(self.config.history_window);
        let classified = timeout(limit, self.classifier.classify(&window))
            .await
            .unwrap_or_else(|_| Err(self.intent_timed_out()));
        let classification = match classified {
            Ok(classification) => classification,
            Err(err) => {
                on_event(SessionEvent::ClassificationFailed(err.to_string()));
                return;
            }
        };
        on_event(SessionEvent::Classified {
            relevant: classification.relevant,
            rationale: classification.rationale,
        });
        if !classification.relevant {
            return;
        }

        let extracted = timeout(limit, self.extractor.extract(utterance))
            .await
            .unwrap_or_else(|_| Err(self.intent_timed_out()));
        let subject = match extracted {
            Ok(subject) => subject,
            Err(err) => {
                on_event(SessionEvent::ExtractionFailed(err.to_string()));
                return;
            }
        };
        on_event(SessionEvent::SubjectExtracted(subject.clone()));
        let Some(person) = subject else {
            return;
        };

        let result = self.resolve(&person).await;
        let fact = match &result {
            CapabilityResult::Found(food) => food_found_fact(&person, food),
            CapabilityResult::NotFound | CapabilityResult::Unavailable(_) => {
                food_unknown_fact(&person)
            }
        };
        on_event(SessionEvent::CapabilityResolved {
            subject: person,
            result,
        });
        self.transcript.push_system(fact);
    }

    async fn run_native_tools<F: FnMut(SessionEvent)>(
        &mut self,
        on_event: &mut F,
    ) -> LlmResult<String> {
        let calls = match self.stream_reply(tool_declarations(), on_event).await? {
            StreamedReply::Text(text) => return Ok(text),
            StreamedReply::ToolCalls(calls) => calls,
        };

        let mut tool_turns = Vec::with_capacity(calls.len());
        for call in &calls {
            on_event(SessionEvent::ToolRequested {
                name: call.name.clone(),
                args_json: call.args_json.clone(),
            });

            let plan = plan_call(call);
            let result = match &plan {
                ToolCallPlan::Lookup { person } => {
                    let result = self.resolve(person).await;
                    on_event(SessionEvent::CapabilityResolved {
                        subject: person.clone(),
                        result: result.clone(),
                    });
                    Some(result)
                }
                ToolCallPlan::Rejected { .. } => None,
            };
            tool_turns.push((call.name.clone(), tool_turn_text(&plan, result.as_ref())));
        }
        for (name, text) in tool_turns {
            self.transcript.push_tool(name, text);
        }

        Ok(self.stream_reply(Vec::new(), on_event).await?.into_text())
    }

    fn model_wait(&self) -> Duration {
        Duration::from_millis(self.config.stream_idle_timeout_ms)
    }

    fn intent_timed_out(&self) -> IntentError {
        IntentError::TimedOut {
            after_ms: self.config.stream_idle_timeout_ms,
        }
    }

    async fn resolve(&self, person: &str) -> CapabilityResult {
        let limit_ms = self.config.capability_timeout_ms;
        match timeout(
            Duration::from_millis(limit_ms),
            self.capability.resolve(person),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => CapabilityResult::Unavailable(format!("lookup timed out after {limit_ms} ms")),
        }
    }

    // Chunks are surfaced strictly in arrival order. When tools were offered,
    // the first chunk carrying calls ends the stream; what it displayed so far
    // is never committed.
    async fn stream_reply<F: FnMut(SessionEvent)>(
        &self,
        tools: Vec<ToolDeclaration>,
        on_event: &mut F,
    ) -> LlmResult<StreamedReply> {
        let offers_tools = !tools.is_empty();
        let idle_ms = self.config.stream_idle_timeout_ms;
        let request = ChatRequest {
            messages: self.transcript.turns().to_vec(),
            tools,
        };
        let mut stream = timeout(self.model_wait(), self.provider.chat_stream(request))
            .await
            .map_err(|_| LlmError::StreamStalled { idle_ms })??;

        let mut assembler = ChunkAssembler::new();
        loop {
            let next = timeout(self.model_wait(), stream.next())
                .await
                .map_err(|_| LlmError::StreamStalled { idle_ms })?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            if offers_tools && !chunk.tool_calls.is_empty() {
                return Ok(StreamedReply::ToolCalls(chunk.tool_calls));
            }

            let fragment = assembler.push(&chunk.content, chunk.done);
            if !fragment.is_empty() {
                on_event(SessionEvent::Chunk(fragment.to_string()));
            }
            if chunk.done {
                break;
            }
        }

        Ok(StreamedReply::Text(assembler.finish()))
    }
}

impl StreamedReply {
    // Without a tool manifest every stream ends as text.
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::ToolCalls(_) => String::new(),
        }
    }
}
