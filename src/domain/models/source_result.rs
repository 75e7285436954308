use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceStatus {
    Success,
    Error,
    Timeout,
    /// Internal only; never part of a caller-visible response.
    BlockedByPolicy,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Success => "SUCCESS",
            SourceStatus::Error => "ERROR",
            SourceStatus::Timeout => "TIMEOUT",
            SourceStatus::BlockedByPolicy => "BLOCKED_BY_POLICY",
        }
    }

    pub fn is_visible(&self) -> bool {
        !matches!(self, SourceStatus::BlockedByPolicy)
    }
}

/// Outcome of querying one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResult {
    source_urn: String,
    status: SourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    latency_ms: f64,
}

impl SourceResult {
    pub fn success(source_urn: impl Into<String>, payload: Value, latency: Duration) -> Self {
        Self {
            source_urn: source_urn.into(),
            status: SourceStatus::Success,
            payload: Some(payload),
            detail: None,
            latency_ms: as_millis(latency),
        }
    }

    pub fn error(
        source_urn: impl Into<String>,
        detail: impl Into<String>,
        latency: Duration,
    ) -> Self {
        Self {
            source_urn: source_urn.into(),
            status: SourceStatus::Error,
            payload: None,
            detail: Some(detail.into()),
            latency_ms: as_millis(latency),
        }
    }

    pub fn timeout(source_urn: impl Into<String>, latency: Duration) -> Self {
        Self {
            source_urn: source_urn.into(),
            status: SourceStatus::Timeout,
            payload: None,
            detail: None,
            latency_ms: as_millis(latency),
        }
    }

    pub fn blocked(source_urn: impl Into<String>) -> Self {
        Self {
            source_urn: source_urn.into(),
            status: SourceStatus::BlockedByPolicy,
            payload: None,
            detail: None,
            latency_ms: 0.0,
        }
    }

    pub fn source_urn(&self) -> &str {
        &self.source_urn
    }

    pub fn status(&self) -> SourceStatus {
        self.status
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency_ms
    }

    pub fn latency(&self) -> Duration {
        Duration::from_secs_f64(self.latency_ms.max(0.0) / 1000.0)
    }

    pub fn is_success(&self) -> bool {
        self.status == SourceStatus::Success
    }
}

fn as_millis(latency: Duration) -> f64 {
    latency.as_secs_f64() * 1000.0
}

/// Final per-query artifact returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResponse {
    query_id: Uuid,
    results: Vec<SourceResult>,
    partial: bool,
}

impl AggregatedResponse {
    /// Builds a response from results already in relevance order. Blocked entries are
    /// dropped; `partial` is set when anything was dispatched and any entry failed.
    pub fn assemble(query_id: Uuid, results: Vec<SourceResult>) -> Self {
        let results: Vec<SourceResult> = results
            .into_iter()
            .filter(|r| r.status().is_visible())
            .collect();
        let partial = !results.is_empty() && results.iter().any(|r| !r.is_success());
        Self {
            query_id,
            results,
            partial,
        }
    }

    pub fn empty(query_id: Uuid) -> Self {
        Self::assemble(query_id, Vec::new())
    }

    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    pub fn results(&self) -> &[SourceResult] {
        &self.results
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn urns(&self) -> Vec<&str> {
        self.results.iter().map(SourceResult::source_urn).collect()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn count_with_status(&self, status: SourceStatus) -> usize {
        self.results.iter().filter(|r| r.status() == status).count()
    }

    pub fn successful_urns(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.is_success())
            .map(SourceResult::source_urn)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_assemble_drops_blocked_entries() {
        let response = AggregatedResponse::assemble(
            Uuid::new_v4(),
            vec![
                SourceResult::success("urn:a", json!([1]), ms(5)),
                SourceResult::blocked("urn:b"),
            ],
        );

        assert_eq!(response.urns(), vec!["urn:a"]);
        assert!(!response.is_partial());
    }

    #[test]
    fn test_total_failure_is_partial() {
        let response = AggregatedResponse::assemble(
            Uuid::new_v4(),
            vec![
                SourceResult::error("urn:a", "502", ms(5)),
                SourceResult::timeout("urn:b", ms(100)),
            ],
        );

        assert!(response.is_partial());
        assert_eq!(response.success_count(), 0);
    }

    #[test]
    fn test_empty_response_is_not_partial() {
        let response = AggregatedResponse::empty(Uuid::new_v4());

        assert!(response.results().is_empty());
        assert!(!response.is_partial());
    }

    #[test]
    fn test_serialized_status_names() {
        let value = serde_json::to_value(SourceResult::timeout("urn:a", ms(1))).unwrap();

        assert_eq!(value["status"], "TIMEOUT");
        assert!(value.get("payload").is_none());
    }
}
