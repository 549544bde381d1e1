use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde_json::json;

use super::{CapabilityProvider, CapabilityResult};
use crate::resource::StdioTransport;
use crate::resource::protocol::{PROTOCOL_VERSION, ReadResourceResult, favorite_food_uri};

/// Resolves favorite foods by reading `resource://favorite/food/{person}`
/// from a resource server running as a child process.
pub struct RemoteCapability {
    transport: StdioTransport,
}

impl RemoteCapability {
    /// Spawns the server and completes the initialize handshake.
    pub async fn spawn(program: &Path, args: &[String]) -> Result<Self> {
        let transport = StdioTransport::spawn(program, args)?;
        Self::connect(transport).await
    }

    pub async fn connect(transport: StdioTransport) -> Result<Self> {
        transport
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "clientInfo": {"name": "foodchat", "version": env!("CARGO_PKG_VERSION")},
                    "capabilities": {}
                })),
            )
            .await
            .context("resource server initialize failed")?;
        transport
            .notify("notifications/initialized", None)
            .await
            .context("resource server initialized notification failed")?;

        Ok(Self { transport })
    }

    async fn read_food(&self, person: &str) -> Result<String> {
        let result = self
            .transport
            .request(
                "resources/read",
                Some(json!({"uri": favorite_food_uri(person)})),
            )
            .await?;
        let result = serde_json::from_value::<ReadResourceResult>(result)
            .context("malformed resources/read result")?;

        let text = result
            .contents
            .into_iter()
            .find_map(|contents| contents.text)
            .ok_or_else(|| anyhow!("resource has no text contents"))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(anyhow!("resource text is empty"));
        }
        Ok(text.to_string())
    }
}

impl CapabilityProvider for RemoteCapability {
    // Server-side not-found arrives as an error object too, so every failure
    // reads as Unavailable here.
    async fn resolve(&self, subject: &str) -> CapabilityResult {
        match self.read_food(subject).await {
            Ok(food) => CapabilityResult::Found(food),
            Err(err) => CapabilityResult::Unavailable(format!("{err:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use tempfile::tempdir;
    use tokio::io::{AsyncWriteExt, BufReader, duplex};

    use super::RemoteCapability;
    use crate::capability::test_support::seed_database;
    use crate::capability::{CapabilityProvider, CapabilityResult, FoodStore};
    use crate::resource::{ResourceServer, StdioTransport};

    async fn connected(rows: &[(&str, &str)]) -> (RemoteCapability, tempfile::TempDir) {
        let dir = tempdir().expect("tempdir");
        let path = seed_database(dir.path(), rows);
        let server = ResourceServer::new(FoodStore::open(&path).expect("open store"));

        let (client_out, server_in) = duplex(8192);
        let (server_out, client_in) = duplex(8192);
        tokio::spawn(async move {
            server
                .serve(BufReader::new(server_in), server_out)
                .await
                .expect("serve");
        });

        let transport = StdioTransport::from_streams(client_out, BufReader::new(client_in));
        let remote = RemoteCapability::connect(transport)
            .await
            .expect("handshake");
        (remote, dir)
    }

    #[tokio::test]
    async fn resolve_reads_food_through_resource_server() {
        let (remote, _dir) = connected(&[("Gabriel", "sushi"), ("Ana Maria", "moqueca")]).await;

        assert_eq!(
            remote.resolve("Gabriel").await,
            CapabilityResult::Found("sushi".to_string())
        );
        assert_eq!(
            remote.resolve("Ana Maria").await,
            CapabilityResult::Found("moqueca".to_string())
        );
    }

    #[tokio::test]
    async fn resolve_maps_server_not_found_to_unavailable() {
        let (remote, _dir) = connected(&[("Gabriel", "sushi")]).await;

        match remote.resolve("Zara").await {
            CapabilityResult::Unavailable(reason) => assert!(reason.contains("-32002")),
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolve_rejects_blank_resource_text() {
        let (client_out, _server_in) = duplex(4096);
        let (mut server_out, client_in) = duplex(4096);
        let init = json!({"jsonrpc": "2.0", "id": 1, "result": {}});
        let read = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": {"contents": [{"uri": "resource://favorite/food/Gabriel", "text": "  "}]}
        });
        for message in [init, read] {
            let line = format!("{}\n", Value::to_string(&message));
            server_out.write_all(line.as_bytes()).await.expect("write");
        }

        let transport = StdioTransport::from_streams(client_out, BufReader::new(client_in));
        let remote = RemoteCapability::connect(transport)
            .await
            .expect("handshake");

        match remote.resolve("Gabriel").await {
            CapabilityResult::Unavailable(reason) => assert!(reason.contains("empty")),
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }
}
