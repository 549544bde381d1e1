use reqwest::header::HeaderValue;
use serde_json::Value;

pub const REDACTED: &str = "***REDACTED***";

/// Controls the `--verbose` HTTP dump written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpDebugConfig {
    pub enabled: bool,
    pub redact_secrets: bool,
    pub max_body_chars: usize,
}

impl HttpDebugConfig {
    pub fn from_verbose(verbose: bool) -> Self {
        Self {
            enabled: verbose,
            redact_secrets: true,
            max_body_chars: 2_000,
        }
    }

    pub fn disabled() -> Self {
        Self::from_verbose(false)
    }

    /// Header value as it may appear in a debug dump.
    pub fn printable_header(&self, name: &str, value: &HeaderValue) -> String {
        if self.redact_secrets && is_secret_name(name) {
            return REDACTED.to_string();
        }
        value.to_str().unwrap_or("<non-utf8>").to_string()
    }

    /// Body as it may appear in a debug dump: secrets masked, then shortened.
    pub fn printable_body(&self, raw: &str) -> String {
        let body = if self.redact_secrets {
            mask_json_secrets(raw)
        } else {
            raw.to_string()
        };
        shorten(&body, self.max_body_chars)
    }
}

/// Masks secret-looking keys at any depth. Bodies that are not JSON are kept.
pub fn mask_json_secrets(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(mut json) => {
            mask_value(&mut json);
            serde_json::to_string(&json).unwrap_or_else(|_| raw.to_string())
        }
        Err(_) => raw.to_string(),
    }
}

fn shorten(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        None => input.to_string(),
        Some((cut, _)) => {
            let dropped = input[cut..].chars().count();
            format!("{}... <truncated {dropped} chars>", &input[..cut])
        }
    }
}

fn mask_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, item) in map.iter_mut() {
                if is_secret_name(key) {
                    *item = Value::String(REDACTED.to_string());
                } else {
                    mask_value(item);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(mask_value),
        _ => {}
    }
}

fn is_secret_name(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "authorization" | "api_key" | "apikey" | "x-api-key" | "token" | "password"
    )
}

#[cfg(test)]
mod tests {
    use super::{HttpDebugConfig, mask_json_secrets, shorten};
    use reqwest::header::HeaderValue;

    #[test]
    fn verbose_flag_keeps_redaction_on() {
        let cfg = HttpDebugConfig::from_verbose(true);
        assert!(cfg.enabled);
        assert!(cfg.redact_secrets);
        assert!(!HttpDebugConfig::disabled().enabled);
    }

    #[test]
    fn bearer_header_is_hidden_unless_redaction_is_off() {
        let bearer = HeaderValue::from_static("Bearer ollama-key");
        let mut cfg = HttpDebugConfig::from_verbose(true);
        assert_eq!(cfg.printable_header("Authorization", &bearer), "***REDACTED***");
        assert_eq!(
            cfg.printable_header("content-type", &HeaderValue::from_static("application/json")),
            "application/json"
        );

        cfg.redact_secrets = false;
        assert_eq!(cfg.printable_header("Authorization", &bearer), "Bearer ollama-key");
    }

    #[test]
    fn secrets_inside_chat_payload_are_masked() {
        let raw = r#"{"model":"llama3.2","options":{"api_key":"123"},"messages":[{"token":"t","content":"hi"}]}"#;
        let masked = mask_json_secrets(raw);
        assert!(masked.contains("\"model\":\"llama3.2\""));
        assert!(masked.contains("\"api_key\":\"***REDACTED***\""));
        assert!(masked.contains("\"token\":\"***REDACTED***\""));
        assert!(masked.contains("\"content\":\"hi\""));
        assert!(!masked.contains("123"));
    }

    #[test]
    fn ndjson_body_passes_through_unmasked() {
        let ndjson = "{\"done\":false}\n{\"done\":true}";
        assert_eq!(mask_json_secrets(ndjson), ndjson);
        assert_eq!(mask_json_secrets("token=abc"), "token=abc");
    }

    #[test]
    fn shorten_counts_dropped_chars() {
        assert_eq!(shorten("sushi and ramen", 5), "sushi... <truncated 10 chars>");
        assert_eq!(shorten("pão", 3), "pão");
        assert_eq!(shorten("feijão", 4), "feij... <truncated 2 chars>");
    }
}
