use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::protocol::{JsonRpcRequest, JsonRpcResponse};

type Writer = Box<dyn AsyncWrite + Send + Unpin>;
type Reader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Client side of the newline-delimited JSON-RPC channel to a resource server.
pub struct StdioTransport {
    // Held so the server is killed when the transport goes away.
    _child: Mutex<Option<Child>>,
    next_id: AtomicU64,
    stdin: Mutex<Writer>,
    stdout: Mutex<Reader>,
}

impl StdioTransport {
    pub fn spawn(program: &Path, args: &[String]) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn resource server {}", program.display()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("resource server stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("resource server stdout unavailable"))?;

        let mut transport = Self::from_streams(stdin, BufReader::new(stdout));
        transport._child = Mutex::new(Some(child));
        Ok(transport)
    }

    pub fn from_streams<W, R>(writer: W, reader: R) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        Self {
            _child: Mutex::new(None),
            next_id: AtomicU64::new(1),
            stdin: Mutex::new(Box::new(writer)),
            stdout: Mutex::new(Box::new(reader)),
        }
    }

    /// Sends one request and waits for the response carrying its id.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.write_message(&JsonRpcRequest::new(Some(id), method, params))
            .await?;

        let response = self.read_response(id).await?;
        if let Some(error) = response.error {
            bail!("resource server error {}: {}", error.code, error.message);
        }
        response
            .result
            .ok_or_else(|| anyhow!("resource server response missing result"))
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.write_message(&JsonRpcRequest::new(None, method, params))
            .await
    }

    async fn write_message(&self, message: &JsonRpcRequest) -> Result<()> {
        let mut encoded = serde_json::to_string(message)?;
        encoded.push('\n');

        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(encoded.as_bytes())
            .await
            .context("writing to resource server")?;
        stdin.flush().await.context("flushing resource server input")?;
        Ok(())
    }

    // A request abandoned by a caller timeout leaves its answer in the pipe;
    // responses for other ids are skipped so the channel stays in step.
    async fn read_response(&self, id: u64) -> Result<JsonRpcResponse> {
        let mut stdout = self.stdout.lock().await;
        let mut line = String::new();
        loop {
            line.clear();
            let read = stdout
                .read_line(&mut line)
                .await
                .context("reading from resource server")?;
            if read == 0 {
                bail!("resource server closed its output");
            }
            if line.trim().is_empty() {
                continue;
            }

            let response = serde_json::from_str::<JsonRpcResponse>(&line)
                .with_context(|| format!("invalid resource server response: {}", line.trim()))?;
            if response.id.as_u64() == Some(id) {
                return Ok(response);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};

    use super::StdioTransport;

    #[tokio::test]
    async fn request_skips_responses_for_other_ids() {
        let (client_out, server_in) = duplex(4096);
        let (mut server_out, client_in) = duplex(4096);
        let transport = StdioTransport::from_streams(client_out, BufReader::new(client_in));

        let server = tokio::spawn(async move {
            let mut lines = BufReader::new(server_in).lines();
            let line = lines.next_line().await.expect("read").expect("line");
            let request: Value = serde_json::from_str(&line).expect("request json");
            assert_eq!(request["method"], json!("ping"));
            assert_eq!(request["id"], json!(1));
            server_out
                .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":99,\"result\":\"stale\"}\n\n")
                .await
                .expect("write stale");
            server_out
                .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":\"fresh\"}\n")
                .await
                .expect("write fresh");
        });

        let result = transport.request("ping", None).await.expect("result");
        assert_eq!(result, json!("fresh"));
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn request_surfaces_error_objects() {
        let (client_out, _server_in) = duplex(4096);
        let (mut server_out, client_in) = duplex(4096);
        let transport = StdioTransport::from_streams(client_out, BufReader::new(client_in));
        server_out
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"error\":{\"code\":-32002,\"message\":\"missing\"}}\n")
            .await
            .expect("write");

        let err = transport
            .request("resources/read", Some(json!({"uri": "x"})))
            .await
            .expect_err("error response");
        assert_eq!(err.to_string(), "resource server error -32002: missing");
    }

    #[tokio::test]
    async fn request_fails_when_server_output_closes() {
        let (client_out, _server_in) = duplex(4096);
        let (server_out, client_in) = duplex(4096);
        let transport = StdioTransport::from_streams(client_out, BufReader::new(client_in));
        drop(server_out);

        let err = transport.request("ping", None).await.expect_err("eof");
        assert!(err.to_string().contains("closed its output"));
    }

    #[tokio::test]
    async fn notify_writes_message_without_id() {
        let (client_out, server_in) = duplex(4096);
        let (_server_out, client_in) = duplex(4096);
        let transport = StdioTransport::from_streams(client_out, BufReader::new(client_in));

        transport
            .notify("notifications/initialized", None)
            .await
            .expect("notify");

        let mut lines = BufReader::new(server_in).lines();
        let line = lines.next_line().await.expect("read").expect("line");
        assert_eq!(
            serde_json::from_str::<Value>(&line).expect("json"),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"})
        );
    }
}
