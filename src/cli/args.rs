use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[command(name = "foodchat")]
#[command(
    about = "Chat with a local model that can look up people's favorite food",
    long_about = "Chat with a local model that can look up people's favorite food\n\nConfig file loading:\n  - --config <path> (explicit file, overrides default path discovery)\n  - Default probe path when --config is not provided:\n    1. $XDG_CONFIG_HOME/foodchat/config.toml\n    2. ~/.config/foodchat/config.toml\n\nIn the chat, a line that is exactly /clean resets the conversation and /debug toggles turn diagnostics."
)]
pub struct CliArgs {
    /// Load config from this file path instead of the default discovery path.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Print HTTP requests and responses to stderr, with secrets redacted.
    #[arg(long, short = 'v')]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve favorite-food lookups as JSON-RPC resources on stdin/stdout.
    Serve {
        /// Database file to serve; defaults to the configured database_path.
        #[arg(long, value_name = "PATH")]
        database: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::{CliArgs, Command};
    use clap::Parser;
    use std::path::Path;

    #[test]
    fn parse_defaults() {
        let args = CliArgs::try_parse_from(["foodchat"]).expect("should parse");
        assert_eq!(args.config, None);
        assert!(!args.verbose);
        assert_eq!(args.command, None);
    }

    #[test]
    fn parse_config_and_verbose_flags() {
        let args = CliArgs::try_parse_from(["foodchat", "--config", "/tmp/custom.toml", "-v"])
            .expect("parse");
        assert_eq!(args.config.as_deref(), Some(Path::new("/tmp/custom.toml")));
        assert!(args.verbose);
    }

    #[test]
    fn parse_serve_subcommand() {
        let args = CliArgs::try_parse_from(["foodchat", "serve", "--database", "/tmp/foods.db"])
            .expect("parse");
        assert_eq!(
            args.command,
            Some(Command::Serve {
                database: Some("/tmp/foods.db".into())
            })
        );
    }

    #[test]
    fn parse_rejects_unknown_subcommand() {
        assert!(CliArgs::try_parse_from(["foodchat", "chat"]).is_err());
    }
}
