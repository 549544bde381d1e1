use crate::agent::{
    ChatSession, EntityExtractor, SessionEvent, SubjectClassifier, TurnOutcome,
};
use crate::capability::{CapabilityProvider, CapabilityResult};
use crate::llm::provider::LlmProvider;
use crate::trace::{SessionTrace, TraceKind};
use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Write};

pub const USER_PROMPT: &str = "you> ";
pub const ASSISTANT_PREFIX: &str = "assistant> ";
const APP_PREFIX: &str = "app> ";
const DEBUG_PREFIX: &str = "[debug]";

pub struct AppState<P, C, K, E> {
    pub session_id: String,
    pub session: ChatSession<P, C, K, E>,
    pub trace: SessionTrace,
    pub startup_message: Option<String>,
}

pub async fn run_repl<P, C, K, E>(state: &mut AppState<P, C, K, E>) -> Result<()>
where
    P: LlmProvider,
    C: CapabilityProvider,
    K: SubjectClassifier,
    E: EntityExtractor,
{
    let mut rl = DefaultEditor::new()?;
    state.trace.record(
        TraceKind::App,
        &format!("session {} started", state.session_id),
    );
    if let Some(message) = &state.startup_message {
        println!("{APP_PREFIX}{message}");
    }

    loop {
        match rl.readline(USER_PROMPT) {
            Ok(line) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    let _ = rl.add_history_entry(trimmed);
                }

                handle_line(state, &line).await;
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }

    state.trace.record(TraceKind::App, "session ended");
    Ok(())
}

async fn handle_line<P, C, K, E>(state: &mut AppState<P, C, K, E>, line: &str)
where
    P: LlmProvider,
    C: CapabilityProvider,
    K: SubjectClassifier,
    E: EntityExtractor,
{
    state.trace.record(TraceKind::UserInput, line);
    // Toggling happens only on command lines, which emit no events.
    let diagnostics = state.session.diagnostics();
    let trace = &state.trace;
    let mut printed_prefix = false;

    let outcome = state
        .session
        .submit(line, &mut |event| match event {
            SessionEvent::Chunk(text) => {
                if !printed_prefix {
                    print!("{ASSISTANT_PREFIX}");
                    printed_prefix = true;
                }
                print!("{text}");
                let _ = io::stdout().flush();
            }
            other => report_diagnostic(trace, diagnostics, &other),
        })
        .await;

    match outcome {
        Ok(TurnOutcome::Replied(reply)) => {
            if printed_prefix {
                println!();
            } else {
                println!("{ASSISTANT_PREFIX}");
            }
            state.trace.record(TraceKind::AssistantOutput, &reply);
        }
        Ok(TurnOutcome::Cleared) => {
            app_message(&state.trace, "Message history cleared.");
        }
        Ok(TurnOutcome::DiagnosticsToggled(enabled)) => {
            app_message(&state.trace, &format!("Debug mode set to {enabled}."));
        }
        Err(err) => {
            if printed_prefix {
                println!();
            }
            eprintln!("Assistant request failed: {err}");
            state
                .trace
                .record(TraceKind::App, &format!("assistant request failed: {err}"));
        }
    }
}

fn app_message(trace: &SessionTrace, message: &str) {
    println!("{APP_PREFIX}{message}");
    trace.record(TraceKind::App, message);
}

fn report_diagnostic(trace: &SessionTrace, diagnostics: bool, event: &SessionEvent) {
    let Some(text) = describe_event(event) else {
        return;
    };

    let kind = match event {
        SessionEvent::ToolRequested { .. } | SessionEvent::CapabilityResolved { .. } => {
            TraceKind::Tool
        }
        _ => TraceKind::Intent,
    };
    trace.record(kind, &text);
    if diagnostics {
        eprintln!("{DEBUG_PREFIX} {text}");
    }
}

pub fn describe_event(event: &SessionEvent) -> Option<String> {
    let text = match event {
        SessionEvent::Chunk(_) => return None,
        SessionEvent::Classified {
            relevant,
            rationale,
        } => format!("food subject: {relevant} ({rationale})"),
        SessionEvent::ClassificationFailed(err) => format!("classifier failed: {err}"),
        SessionEvent::SubjectExtracted(Some(name)) => format!("name: {name}"),
        SessionEvent::SubjectExtracted(None) => "name: <none>".to_string(),
        SessionEvent::ExtractionFailed(err) => format!("extractor failed: {err}"),
        SessionEvent::ToolRequested { name, args_json } => {
            format!("tool request: {name} {args_json}")
        }
        SessionEvent::CapabilityResolved { subject, result } => match result {
            CapabilityResult::Found(food) => format!("from database: {subject} -> {food}"),
            other => format!("from database: {subject} -> {other}"),
        },
    };
    Some(text)
}
