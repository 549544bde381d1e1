use anyhow::{Context, Result, bail};
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use time::macros::format_description;

const APP_DIR: &str = "foodchat";
const TRACES_DIR: &str = "traces";

/// Tag written in front of every trace line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    UserInput,
    AssistantOutput,
    App,
    Intent,
    Tool,
    HttpOut,
    HttpIn,
    HttpError,
}

impl TraceKind {
    fn tag(self) -> &'static str {
        match self {
            Self::UserInput => "chat.in",
            Self::AssistantOutput => "chat.out",
            Self::App => "app",
            Self::Intent => "intent",
            Self::Tool => "tool",
            Self::HttpOut => "http.out",
            Self::HttpIn => "http.in",
            Self::HttpError => "http.err",
        }
    }
}

/// Append-only record of one chat session: what the user typed, what came
/// back, every lookup decision and every model exchange.
///
/// Clones share the same file.
#[derive(Clone)]
pub struct SessionTrace {
    shared: Arc<TraceFile>,
}

struct TraceFile {
    path: PathBuf,
    out: Mutex<BufWriter<File>>,
    warned: AtomicBool,
}

impl SessionTrace {
    pub fn create(session_id: &str) -> Result<Self> {
        let state_home = env::var("XDG_STATE_HOME").ok();
        let dir = trace_dir(state_home.as_deref(), dirs::home_dir().as_deref())?;
        Self::create_in(&dir, session_id)
    }

    pub fn create_in(dir: &Path, session_id: &str) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create trace directory {}", dir.display()))?;

        let path = dir.join(format!("session-{session_id}.log"));
        let file = open_private(&path)
            .with_context(|| format!("Failed to create trace file {}", path.display()))?;

        Ok(Self {
            shared: Arc::new(TraceFile {
                path,
                out: Mutex::new(BufWriter::new(file)),
                warned: AtomicBool::new(false),
            }),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.shared.path
    }

    /// Writes `text` one timestamped line per source line. Empty text is
    /// recorded as `<empty>` so blank turns stay visible.
    pub fn record(&self, kind: TraceKind, text: &str) {
        let stamp = timestamp();
        let tag = kind.tag();
        let mut block = String::new();
        if text.is_empty() {
            block.push_str(&format!("[{stamp}] [{tag:<8}] <empty>\n"));
        }
        for line in text.lines() {
            block.push_str(&format!("[{stamp}] [{tag:<8}] {line}\n"));
        }
        self.append(&block);
    }

    fn append(&self, block: &str) {
        let written = match self.shared.out.lock() {
            Ok(mut out) => out
                .write_all(block.as_bytes())
                .and_then(|()| out.flush())
                .is_ok(),
            Err(_) => false,
        };
        // Warn once; a broken trace never interrupts the chat.
        if !written && !self.shared.warned.swap(true, Ordering::Relaxed) {
            eprintln!(
                "foodchat: could not write trace file {}",
                self.shared.path.display()
            );
        }
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    File::create(path)
}

fn timestamp() -> String {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );
    OffsetDateTime::now_utc()
        .format(&format)
        .unwrap_or_else(|_| "0000-00-00T00:00:00.000Z".to_string())
}

fn trace_dir(state_home: Option<&str>, home: Option<&Path>) -> Result<PathBuf> {
    let base = match (state_home.map(str::trim), home) {
        (Some(""), _) => bail!("Failed to resolve trace path: XDG_STATE_HOME is set but empty"),
        (Some(state), _) => PathBuf::from(state),
        (None, Some(home)) => home.join(".local").join("state"),
        (None, None) => bail!("Failed to resolve trace path: HOME directory is unavailable"),
    };
    Ok(base.join(APP_DIR).join(TRACES_DIR))
}
