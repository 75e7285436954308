use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::application::{RemoteSourceClient, SourceClientProvider, TranslatedRequest};
use crate::domain::{DispatchTarget, DomainError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Maps `sse://` to `http://` and `sses://` to `https://`. Plain HTTP(S) URLs pass
/// through unchanged.
pub fn resolve_endpoint(endpoint: &str) -> Result<String, DomainError> {
    if let Some(rest) = endpoint.strip_prefix("sse://") {
        Ok(format!("http://{}", rest))
    } else if let Some(rest) = endpoint.strip_prefix("sses://") {
        Ok(format!("https://{}", rest))
    } else if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(endpoint.to_string())
    } else {
        Err(DomainError::invalid_input(format!(
            "Unsupported endpoint scheme: {}",
            endpoint
        )))
    }
}

/// Queries one source over HTTP and reads the reply as a server-sent-event stream.
///
/// The request body is the serialized [`TranslatedRequest`]. Every non-empty
/// `data:` line is decoded as JSON; the payload is the array of decoded events.
pub struct SseSourceClient {
    client: reqwest::Client,
    url: String,
}

impl SseSourceClient {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Result<Self, DomainError> {
        Ok(Self {
            client,
            url: resolve_endpoint(endpoint)?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RemoteSourceClient for SseSourceClient {
    async fn query(&self, request: &TranslatedRequest, deadline: Instant) -> Result<Value, DomainError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(DomainError::timeout(format!(
                "Deadline passed before dispatching to {}",
                request.source_urn()
            )));
        }

        debug!("Dispatching query {} to {}", request.query_id(), self.url);

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .timeout(remaining)
            .send()
            .await
            .map_err(|e| transport_error(request.source_urn(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::source_query(format!(
                "{} answered with HTTP {}",
                request.source_urn(),
                status
            )));
        }

        let mut decoder = EventDecoder::new(request.source_urn());
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| transport_error(request.source_urn(), e))?;
            decoder.push(&chunk);
        }

        Ok(Value::Array(decoder.finish()))
    }
}

fn transport_error(urn: &str, e: reqwest::Error) -> DomainError {
    if e.is_timeout() {
        DomainError::timeout(format!("{} did not answer in time", urn))
    } else {
        DomainError::source_query(format!("Request to {} failed: {}", urn, e))
    }
}

/// Incremental `data:` line decoder. Bytes may split lines at any point.
struct EventDecoder<'a> {
    urn: &'a str,
    buffer: Vec<u8>,
    events: Vec<Value>,
}

impl<'a> EventDecoder<'a> {
    fn new(urn: &'a str) -> Self {
        Self {
            urn,
            buffer: Vec::new(),
            events: Vec::new(),
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.line(&line[..line.len() - 1]);
        }
    }

    fn finish(mut self) -> Vec<Value> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.line(&rest);
        }
        self.events
    }

    fn line(&mut self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches('\r');
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim();
        if data.is_empty() {
            return;
        }
        match serde_json::from_str(data) {
            Ok(value) => self.events.push(value),
            Err(e) => warn!("Failed to parse SSE data from {}: {} ({})", self.urn, data, e),
        }
    }
}

/// One long-lived [`SseSourceClient`] per urn over a shared connection pool.
pub struct SseClientPool {
    http: reqwest::Client,
    clients: Mutex<HashMap<String, Arc<SseSourceClient>>>,
}

impl SseClientPool {
    pub fn new() -> Self {
        Self::with_client(
            reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .unwrap_or_default(),
        )
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            clients: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for SseClientPool {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceClientProvider for SseClientPool {
    fn client_for(&self, target: &DispatchTarget) -> Result<Arc<dyn RemoteSourceClient>, DomainError> {
        let url = resolve_endpoint(target.endpoint())?;
        let mut clients = self
            .clients
            .lock()
            .map_err(|e| DomainError::internal(format!("Client pool lock poisoned: {}", e)))?;

        if let Some(existing) = clients.get(target.urn()) {
            if existing.url() == url {
                return Ok(existing.clone());
            }
            debug!("Endpoint of {} changed, replacing client", target.urn());
        }

        let client = Arc::new(SseSourceClient::new(self.http.clone(), target.endpoint())?);
        clients.insert(target.urn().to_string(), client.clone());
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use uuid::Uuid;

    fn target(urn: &str, endpoint: &str) -> DispatchTarget {
        DispatchTarget::new(urn, urn, endpoint, 1.0)
    }

    async fn spawn_source() -> String {
        let app = Router::new()
            .route(
                "/ok",
                post(|Json(body): Json<Value>| async move {
                    let intent = body["intent"].as_str().unwrap_or_default().to_string();
                    format!(
                        ": keep-alive\n\ndata: {{\"row\": 1, \"intent\": \"{}\"}}\n\ndata:\n\ndata: not json\n\ndata: {{\"row\": 2}}\n\n",
                        intent
                    )
                }),
            )
            .route("/fail", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("sse://{}", addr)
    }

    #[test]
    fn test_resolve_endpoint() {
        assert_eq!(resolve_endpoint("sse://host:8080/q").unwrap(), "http://host:8080/q");
        assert_eq!(resolve_endpoint("sses://host/q").unwrap(), "https://host/q");
        assert_eq!(resolve_endpoint("https://host/q").unwrap(), "https://host/q");
        assert!(resolve_endpoint("ftp://host").is_err());
    }

    #[test]
    fn test_decoder_handles_split_lines() {
        let mut decoder = EventDecoder::new("urn:x");
        decoder.push(b"data: {\"a\"");
        decoder.push(b": 1}\r\n\r\nevent: ping\ndata: [1,2]");

        let events = decoder.finish();

        assert_eq!(events, vec![serde_json::json!({"a": 1}), serde_json::json!([1, 2])]);
    }

    #[tokio::test]
    async fn test_collects_data_events() {
        let base = spawn_source().await;
        let pool = SseClientPool::new();
        let target = target("urn:ok", &format!("{}/ok", base));
        let client = pool.client_for(&target).unwrap();
        let request = client.translate(Uuid::new_v4(), "revenue", &target);

        let payload = client
            .query(&request, Instant::now() + Duration::from_secs(5))
            .await
            .unwrap();

        let events = payload.as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["intent"], "revenue");
        assert_eq!(events[1]["row"], 2);
    }

    #[tokio::test]
    async fn test_non_success_status_is_source_error() {
        let base = spawn_source().await;
        let pool = SseClientPool::new();
        let target = target("urn:fail", &format!("{}/fail", base));
        let client = pool.client_for(&target).unwrap();
        let request = client.translate(Uuid::new_v4(), "revenue", &target);

        let err = client
            .query(&request, Instant::now() + Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::SourceQuery(_)));
    }

    #[test]
    fn test_pool_reuses_and_replaces_clients() {
        let pool = SseClientPool::new();

        let first = pool.client_for(&target("urn:a", "sse://one/q")).unwrap();
        let again = pool.client_for(&target("urn:a", "sse://one/q")).unwrap();
        let moved = pool.client_for(&target("urn:a", "sse://two/q")).unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &moved));
    }
}
