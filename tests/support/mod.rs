#![allow(dead_code)]

use expectrl::{Eof, Error as ExpectError, Session};
use rusqlite::{Connection, params};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const EXPECT_TIMEOUT: Duration = Duration::from_secs(5);
const EXPECT_RETRIES: usize = 3;

pub fn binary_path() -> String {
    std::env::var("CARGO_BIN_EXE_foodchat").unwrap_or_else(|_| "target/debug/foodchat".to_string())
}

/// Isolated XDG homes plus a seeded database for one run of the binary.
pub struct TestHome {
    pub config_home: TempDir,
    pub state_home: TempDir,
    pub data_dir: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        Self {
            config_home: tempfile::tempdir().expect("create XDG_CONFIG_HOME tempdir"),
            state_home: tempfile::tempdir().expect("create XDG_STATE_HOME tempdir"),
            data_dir: tempfile::tempdir().expect("create data tempdir"),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.path().join("foods.db")
    }

    pub fn seed_database(&self, rows: &[(&str, &str)]) -> PathBuf {
        let path = self.database_path();
        let conn = Connection::open(&path).expect("create database");
        conn.execute(
            "CREATE TABLE favorite_food (person_name TEXT NOT NULL, food TEXT NOT NULL)",
            [],
        )
        .expect("create table");
        for (person, food) in rows {
            conn.execute(
                "INSERT INTO favorite_food (person_name, food) VALUES (?1, ?2)",
                params![person, food],
            )
            .expect("insert row");
        }
        path
    }

    /// Writes `$XDG_CONFIG_HOME/foodchat/config.toml`.
    pub fn write_config(&self, body: &str) -> PathBuf {
        let dir = self.config_home.path().join("foodchat");
        fs::create_dir_all(&dir).expect("create config dir");
        let path = dir.join("config.toml");
        fs::write(&path, body).expect("write config");
        path
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(binary_path());
        command
            .current_dir(self.data_dir.path())
            .env("XDG_CONFIG_HOME", self.config_home.path())
            .env("XDG_STATE_HOME", self.state_home.path())
            .env_remove("OLLAMA_BASE_URL")
            .env_remove("OLLAMA_MODEL")
            .env_remove("OLLAMA_API_KEY")
            .env_remove("FOODCHAT_DATABASE");
        command
    }

    pub fn spawn_repl(&self) -> Session {
        let mut session = Session::spawn(self.command()).expect("spawn foodchat in PTY");
        session.set_expect_timeout(Some(EXPECT_TIMEOUT));
        session
    }

    pub fn read_trace_file(&self) -> String {
        let trace_dir = self.state_home.path().join("foodchat").join("traces");
        let mut entries = fs::read_dir(&trace_dir)
            .unwrap_or_else(|err| panic!("failed to read {}: {err}", trace_dir.display()))
            .collect::<Result<Vec<_>, _>>()
            .unwrap_or_else(|err| panic!("failed to iterate {}: {err}", trace_dir.display()));
        assert_eq!(
            entries.len(),
            1,
            "expected exactly one trace file in {}",
            trace_dir.display()
        );
        let path = entries.remove(0).path();
        fs::read_to_string(&path)
            .unwrap_or_else(|err| panic!("failed to read {}: {err}", path.display()))
    }
}

pub fn chat_config(base_url: &str, database: &Path, extra: &str) -> String {
    format!(
        "ollama_base_url = \"{base_url}\"\n\
         ollama_model = \"test-model\"\n\
         database_path = \"{}\"\n\
         {extra}",
        database.display()
    )
}

pub fn ndjson_reply(parts: &[&str]) -> String {
    let last = parts.len().saturating_sub(1);
    parts
        .iter()
        .enumerate()
        .map(|(index, part)| {
            format!(
                "{}\n",
                serde_json::json!({
                    "message": {"role": "assistant", "content": part},
                    "done": index == last
                })
            )
        })
        .collect()
}

pub fn structured_reply(content: serde_json::Value) -> String {
    serde_json::json!({
        "message": {"role": "assistant", "content": content.to_string()},
        "done": true
    })
    .to_string()
}

/// Classifier says "food", extractor finds `name`, and the streamed answer is
/// served only when the request carries `required_fact`.
pub async fn mount_food_flow(server: &MockServer, name: &str, required_fact: &str, answer: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({"stream": false})))
        .and(body_string_contains("is_food_subject"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            structured_reply(serde_json::json!({"is_food_subject": true, "reason": "asks about food"})),
            "application/json",
        ))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({"stream": false})))
        .and(body_string_contains("Extract the name"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            structured_reply(serde_json::json!({"name": name, "reason": "named in text"})),
            "application/json",
        ))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .and(body_string_contains(required_fact))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(ndjson_reply(answer), "application/x-ndjson"),
        )
        .expect(1)
        .mount(server)
        .await;
}

pub fn submit_line(session: &mut Session, line: &str) {
    session.send(line).expect("send line text");
    session.send([b'\r']).expect("send Enter");
}

/// Ctrl-D on an empty line is the only way out of the REPL.
pub fn exit_repl(session: &mut Session) {
    session.send([0x04u8]).expect("send Ctrl-D");
    let _ = session.expect(Eof);
    thread::sleep(Duration::from_millis(25));
}

pub fn expect_text(session: &mut Session, text: &str) {
    for attempt in 1..=EXPECT_RETRIES {
        match session.expect(text) {
            Ok(_) => return,
            Err(ExpectError::ExpectTimeout) if attempt < EXPECT_RETRIES => continue,
            Err(err) => panic!(
                "failed to match text {:?} on attempt {}: {}",
                text, attempt, err
            ),
        }
    }

    panic!("unreachable: retries exhausted without returning");
}
