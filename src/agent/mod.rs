pub mod commands;
mod dispatch;
pub mod intent;
mod loop_impl;
pub mod prompt;
pub mod stream;
pub mod transcript;

pub use commands::ControlCommand;
pub use dispatch::{FAVORITE_FOOD_TOOL, tool_declarations};
pub use intent::{
    Classification, EntityExtractor, IntentError, LlmEntityExtractor, LlmSubjectClassifier,
    SubjectClassifier,
};
pub use loop_impl::{ChatSession, SessionConfig, SessionEvent, TurnOutcome};
pub use transcript::Transcript;
