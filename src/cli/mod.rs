mod args;
mod repl;

pub use args::{CliArgs, Command};
pub use repl::{ASSISTANT_PREFIX, AppState, USER_PROMPT, describe_event, run_repl};
