//! Newline-delimited JSON-RPC 2.0 messages spoken between the chat client and
//! `foodchat serve`, shaped after the resource half of the Model Context Protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2025-06-18";
pub const SERVER_NAME: &str = "foodchat-resources";

pub const FAVORITE_FOOD_TEMPLATE: &str = "resource://favorite/food/{person}";
pub const FAVORITE_FOOD_NAME: &str = "get_favorite_food";
pub const FAVORITE_FOOD_DESCRIPTION: &str = "Finds the favorite food of a person by their name";
pub const TEXT_MIME_TYPE: &str = "text/plain";

const FAVORITE_FOOD_PREFIX: &str = "resource://favorite/food/";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const RESOURCE_NOT_FOUND: i64 = -32002;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// Absent for notifications, which never get a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: Option<u64>, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.map(Value::from),
            method: method.to_string(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    pub uri_template: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
}

impl ResourceTemplate {
    pub fn favorite_food() -> Self {
        Self {
            uri_template: FAVORITE_FOOD_TEMPLATE.to_string(),
            name: FAVORITE_FOOD_NAME.to_string(),
            description: FAVORITE_FOOD_DESCRIPTION.to_string(),
            mime_type: TEXT_MIME_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResourceResult {
    pub contents: Vec<ResourceContents>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResourceParams {
    pub uri: String,
}

/// Expands the template, percent-encoding `person` as a single path segment.
pub fn favorite_food_uri(person: &str) -> String {
    format!("{FAVORITE_FOOD_PREFIX}{}", urlencoding::encode(person))
}

/// Inverse of [`favorite_food_uri`]. Rejects other schemes, extra segments and empty names.
pub fn parse_favorite_food_uri(uri: &str) -> Option<String> {
    let segment = uri.strip_prefix(FAVORITE_FOOD_PREFIX)?;
    if segment.is_empty() || segment.contains('/') {
        return None;
    }

    let person = urlencoding::decode(segment).ok()?;
    if person.trim().is_empty() {
        None
    } else {
        Some(person.into_owned())
    }
}
