use anyhow::{Context, Result};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::protocol::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
    RESOURCE_NOT_FOUND, ReadResourceParams, ReadResourceResult, ResourceContents,
    ResourceTemplate, SERVER_NAME, TEXT_MIME_TYPE, parse_favorite_food_uri,
};
use crate::capability::FoodStore;

/// Answers favorite-food resource reads, one datastore lookup per read.
pub struct ResourceServer {
    store: FoodStore,
}

impl ResourceServer {
    pub fn new(store: FoodStore) -> Self {
        Self { store }
    }

    /// Serves requests until the reader hits EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await.context("reading request line")? {
            let Some(response) = self.handle_line(&line) else {
                continue;
            };

            let mut encoded = serde_json::to_string(&response)?;
            encoded.push('\n');
            writer
                .write_all(encoded.as_bytes())
                .await
                .context("writing response")?;
            writer.flush().await.context("flushing response")?;
        }

        Ok(())
    }

    /// Returns `None` for blank lines and notifications.
    pub fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        if line.trim().is_empty() {
            return None;
        }

        let request = match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => request,
            Err(err) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(PARSE_ERROR, format!("parse error: {err}")),
                ));
            }
        };

        let id = request.id.clone()?;
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""),
            ));
        }

        Some(match self.dispatch(&request) {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    fn dispatch(&self, request: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        match request.method.as_str() {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": {
                    "resources": {"subscribe": false, "listChanged": false}
                }
            })),
            "ping" => Ok(json!({})),
            "resources/templates/list" => Ok(json!({
                "resourceTemplates": [ResourceTemplate::favorite_food()]
            })),
            "resources/read" => self.read_resource(request.params.as_ref()),
            other => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            )),
        }
    }

    fn read_resource(&self, params: Option<&Value>) -> Result<Value, JsonRpcError> {
        let params = params
            .cloned()
            .and_then(|value| serde_json::from_value::<ReadResourceParams>(value).ok())
            .ok_or_else(|| JsonRpcError::new(INVALID_PARAMS, "resources/read requires a uri"))?;
        let person = parse_favorite_food_uri(&params.uri).ok_or_else(|| {
            JsonRpcError::new(INVALID_PARAMS, format!("unsupported resource uri: {}", params.uri))
        })?;

        let food = self
            .store
            .lookup(&person)
            .map_err(|err| JsonRpcError::new(INTERNAL_ERROR, err.to_string()))?
            .ok_or_else(|| {
                JsonRpcError::new(
                    RESOURCE_NOT_FOUND,
                    format!("no favorite food recorded for {person}"),
                )
            })?;

        let result = ReadResourceResult {
            contents: vec![ResourceContents {
                uri: params.uri,
                mime_type: Some(TEXT_MIME_TYPE.to_string()),
                text: Some(food),
            }],
        };
        serde_json::to_value(result).map_err(|err| JsonRpcError::new(INTERNAL_ERROR, err.to_string()))
    }
}

/// Runs the server over the process's stdin/stdout.
pub async fn serve_stdio(store: FoodStore) -> Result<()> {
    let server = ResourceServer::new(store);
    server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
}
