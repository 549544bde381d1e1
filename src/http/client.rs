use super::debug::{HttpDebugConfig, REDACTED};
use crate::trace::{SessionTrace, TraceKind};
use reqwest::header::{AUTHORIZATION, HeaderMap};
use reqwest::{Client, Response};
use serde::Serialize;
use std::fmt;
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// Thin wrapper over `reqwest` that mirrors every model exchange into the
/// session trace and, with `--verbose`, into a stderr dump.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    debug: HttpDebugConfig,
    bearer_token: Option<String>,
    trace: Option<SessionTrace>,
    dump: DumpTarget,
}

#[derive(Clone)]
enum DumpTarget {
    Stderr,
    #[cfg(test)]
    Captured(Arc<Mutex<Vec<String>>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedResponse {
    pub status: u16,
    pub body: String,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("debug", &self.debug)
            .field("authenticated", &self.bearer_token.is_some())
            .field("traced", &self.trace.is_some())
            .finish()
    }
}

/// One direction of an exchange: the start line, its headers and a body.
struct Leg<'a> {
    marker: char,
    kind: TraceKind,
    start: String,
    headers: &'a HeaderMap,
    body: &'a str,
}

impl Leg<'_> {
    fn dump_lines(&self, debug: &HttpDebugConfig) -> Vec<String> {
        let marker = self.marker;
        let mut lines = vec![format!("[http-debug] {marker} {}", self.start)];
        lines.extend(self.headers.iter().map(|(name, value)| {
            format!(
                "[http-debug] {marker} {}: {}",
                name.as_str(),
                debug.printable_header(name.as_str(), value)
            )
        }));
        lines.push(format!("[http-debug] {marker}"));

        let body = debug.printable_body(self.body);
        if body.is_empty() {
            lines.push(format!("[http-debug] {marker} <empty body>"));
        } else {
            lines.extend(body.lines().map(|line| format!("[http-debug] {marker} {line}")));
        }
        lines
    }

    // Full bodies go to the trace; only the bearer token is hidden.
    fn trace_text(&self) -> String {
        let mut text = self.start.clone();
        for (name, value) in self.headers {
            let value = if *name == AUTHORIZATION {
                REDACTED
            } else {
                value.to_str().unwrap_or("<non-utf8>")
            };
            text.push_str(&format!("\n{}: {value}", name.as_str()));
        }
        text.push('\n');
        text.push_str(self.body);
        text
    }
}

impl HttpClient {
    pub fn new(inner: Client, debug: HttpDebugConfig) -> Self {
        Self {
            inner,
            debug,
            bearer_token: None,
            trace: None,
            dump: DumpTarget::Stderr,
        }
    }

    pub fn with_trace(mut self, trace: SessionTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|token| !token.trim().is_empty());
        self
    }

    /// POSTs `payload` as JSON and reads the whole body.
    pub async fn post_buffered<T: Serialize + ?Sized>(
        &self,
        url: &str,
        payload: &T,
    ) -> Result<BufferedResponse, reqwest::Error> {
        let response = self.send(url, payload).await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .inspect_err(|err| self.record_failure(err))?;

        self.observe(&response_leg(status, &headers, &body));
        Ok(BufferedResponse { status, body })
    }

    /// POSTs `payload` as JSON and returns as soon as headers arrive; the
    /// caller drains the body as a stream.
    pub async fn post_streaming<T: Serialize + ?Sized>(
        &self,
        url: &str,
        payload: &T,
    ) -> Result<Response, reqwest::Error> {
        let response = self.send(url, payload).await?;
        let status = response.status().as_u16();
        self.observe(&response_leg(status, response.headers(), "<streamed body>"));
        Ok(response)
    }

    async fn send<T: Serialize + ?Sized>(
        &self,
        url: &str,
        payload: &T,
    ) -> Result<Response, reqwest::Error> {
        let mut builder = self.inner.post(url).json(payload);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        let request = builder.build()?;

        {
            let body = request
                .body()
                .and_then(|body| body.as_bytes())
                .map(String::from_utf8_lossy)
                .unwrap_or_default();
            self.observe(&Leg {
                marker: '>',
                kind: TraceKind::HttpOut,
                start: format!("{} {}", request.method(), request.url()),
                headers: request.headers(),
                body: &body,
            });
        }

        self.inner
            .execute(request)
            .await
            .inspect_err(|err| self.record_failure(err))
    }

    fn observe(&self, leg: &Leg<'_>) {
        if let Some(trace) = &self.trace {
            trace.record(leg.kind, &leg.trace_text());
        }
        if self.debug.enabled {
            self.dump(leg.dump_lines(&self.debug));
        }
    }

    fn record_failure(&self, err: &reqwest::Error) {
        if let Some(trace) = &self.trace {
            trace.record(TraceKind::HttpError, &err.to_string());
        }
    }

    fn dump(&self, lines: Vec<String>) {
        match &self.dump {
            DumpTarget::Stderr => {
                for line in lines {
                    eprintln!("{line}");
                }
            }
            #[cfg(test)]
            DumpTarget::Captured(captured) => {
                if let Ok(mut captured) = captured.lock() {
                    captured.extend(lines);
                }
            }
        }
    }

    #[cfg(test)]
    fn capturing(inner: Client, debug: HttpDebugConfig) -> (Self, Arc<Mutex<Vec<String>>>) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let mut client = Self::new(inner, debug);
        client.dump = DumpTarget::Captured(Arc::clone(&captured));
        (client, captured)
    }
}

fn response_leg<'a>(status: u16, headers: &'a HeaderMap, body: &'a str) -> Leg<'a> {
    Leg {
        marker: '<',
        kind: TraceKind::HttpIn,
        start: format!("HTTP {status}"),
        headers,
        body,
    }
}
