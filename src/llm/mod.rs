mod ndjson;
pub mod ollama;
pub mod provider;
