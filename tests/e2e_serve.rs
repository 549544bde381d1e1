#![cfg(unix)]

mod support;

use serde_json::{Value, json};
use serial_test::serial;
use std::io::{BufRead, BufReader, Write};
use std::process::{ChildStdin, ChildStdout, Stdio};
use support::TestHome;

struct ServeProcess {
    child: std::process::Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl ServeProcess {
    fn spawn(home: &TestHome) -> Self {
        let mut child = home
            .command()
            .arg("serve")
            .arg("--database")
            .arg(home.database_path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .expect("spawn foodchat serve");
        let stdin = child.stdin.take().expect("stdin");
        let stdout = BufReader::new(child.stdout.take().expect("stdout"));
        Self {
            child,
            stdin: Some(stdin),
            stdout,
        }
    }

    fn send(&mut self, message: Value) {
        let stdin = self.stdin.as_mut().expect("stdin open");
        writeln!(stdin, "{message}").expect("write request");
        stdin.flush().expect("flush request");
    }

    fn receive(&mut self) -> Value {
        let mut line = String::new();
        self.stdout.read_line(&mut line).expect("read response");
        serde_json::from_str(&line).unwrap_or_else(|err| panic!("bad response {line:?}: {err}"))
    }

    fn request(&mut self, id: u64, method: &str, params: Value) -> Value {
        self.send(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}));
        let response = self.receive();
        assert_eq!(response["id"], json!(id), "response: {response}");
        response
    }

    fn finish(mut self) -> Option<i32> {
        drop(self.stdin.take());
        self.child.wait().expect("wait for serve").code()
    }
}

#[test]
#[serial]
fn serve_answers_resource_reads_over_stdio() {
    let home = TestHome::new();
    home.seed_database(&[("Gabriel", "sushi"), ("Ana Maria", "moqueca")]);
    let mut server = ServeProcess::spawn(&home);

    let init = server.request(1, "initialize", json!({"protocolVersion": "2025-06-18"}));
    assert_eq!(init["result"]["serverInfo"]["name"], json!("foodchat-resources"));
    server.send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));

    let templates = server.request(2, "resources/templates/list", json!({}));
    assert_eq!(
        templates["result"]["resourceTemplates"][0]["uriTemplate"],
        json!("resource://favorite/food/{person}")
    );

    let read = server.request(
        3,
        "resources/read",
        json!({"uri": "resource://favorite/food/Ana%20Maria"}),
    );
    assert_eq!(read["result"]["contents"][0]["text"], json!("moqueca"));
    assert_eq!(read["result"]["contents"][0]["mimeType"], json!("text/plain"));

    let missing = server.request(
        4,
        "resources/read",
        json!({"uri": "resource://favorite/food/Zara"}),
    );
    assert_eq!(missing["error"]["code"], json!(-32002));

    let injected = server.request(
        5,
        "resources/read",
        json!({"uri": "resource://favorite/food/x'%20OR%20'1'%3D'1"}),
    );
    assert_eq!(injected["error"]["code"], json!(-32002));

    assert_eq!(server.finish(), Some(0));
}

#[test]
#[serial]
fn serve_fails_fast_without_database() {
    let home = TestHome::new();
    let output = home
        .command()
        .arg("serve")
        .arg("--database")
        .arg(home.database_path())
        .stdin(Stdio::null())
        .output()
        .expect("run foodchat serve");

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty(), "stdout must stay protocol-only");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Failed to start resource server"),
        "stderr:\n{stderr}"
    );
}
