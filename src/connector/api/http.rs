//! HTTP front door.
//!
//! `POST /v1/query` never reveals which sources exist beyond those that were
//! dispatched: denied candidates are absent from the body and failures are
//! reported with a generic message.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use crate::{AuthorizationContext, DomainError, HardFilters, QueryOptions, SourceDescriptor};

use super::Container;

pub const USER_CONTEXT_HEADER: &str = "x-user-context";

pub fn build_router(container: Arc<Container>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/sources", post(register_source))
        .route("/v1/sources/{urn}", delete(deregister_source))
        .route("/v1/query", post(query))
        .with_state(container)
}

/// Binds `127.0.0.1:<port>` (or `0.0.0.0` when `public`) and serves until Ctrl-C.
pub async fn serve(container: Arc<Container>, port: u16, public: bool) -> Result<()> {
    let host = if public { [0, 0, 0, 0] } else { [127, 0, 0, 1] };
    let addr = SocketAddr::from((host, port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Gateway listening on http://{}", listener.local_addr()?);

    axum::serve(listener, build_router(container))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct QueryBody {
    pub intent: String,
    #[serde(default)]
    pub user_context: Map<String, Value>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub hard_filters: HardFilters,
    pub per_source_timeout_ms: Option<u64>,
    pub overall_timeout_ms: Option<u64>,
}

impl QueryBody {
    fn options(&self) -> QueryOptions {
        let mut options = QueryOptions::new().with_hard_filters(self.hard_filters.clone());
        if let Some(limit) = self.limit {
            options = options.with_limit(limit);
        }
        if let Some(ms) = self.per_source_timeout_ms {
            options = options.with_per_source_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.overall_timeout_ms {
            options = options.with_overall_timeout(Duration::from_millis(ms));
        }
        options
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn register_source(
    State(container): State<Arc<Container>>,
    Json(body): Json<Value>,
) -> Response {
    let descriptor: SourceDescriptor = match serde_json::from_value(body) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, format!("Invalid descriptor: {}", e))
        }
    };

    match container.registry().register(descriptor).await {
        Ok(urn) => (
            StatusCode::CREATED,
            Json(json!({ "status": "registered", "urn": urn })),
        )
            .into_response(),
        Err(e) => {
            let status = registration_status(&e);
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!("Registration failed: {}", e);
            }
            error_response(status, e.to_string())
        }
    }
}

fn registration_status(e: &DomainError) -> StatusCode {
    if e.is_validation() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else if e.is_embedding_unavailable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn deregister_source(
    State(container): State<Arc<Container>>,
    Path(urn): Path<String>,
) -> Response {
    match container.registry().deregister(&urn).await {
        Ok(()) => Json(json!({ "status": "deregistered", "urn": urn })).into_response(),
        Err(e) => {
            error!("Deregistration of {} failed: {}", urn, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Deregistration failed")
        }
    }
}

async fn query(
    State(container): State<Arc<Container>>,
    headers: HeaderMap,
    Json(body): Json<QueryBody>,
) -> Response {
    let context = resolve_context(&headers, &body.user_context);
    let options = body.options();

    match container
        .orchestrator()
        .dispatch_stamped(&body.intent, &context, &options)
        .await
    {
        Ok(stamped) => Json(stamped).into_response(),
        Err(e) => {
            error!("Query failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Query could not be processed")
        }
    }
}

/// The `X-User-Context` header wins over the body when it holds a JSON object.
fn resolve_context(headers: &HeaderMap, body_context: &Map<String, Value>) -> AuthorizationContext {
    let from_header = headers
        .get(USER_CONTEXT_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|text| match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Some(map),
            _ => {
                warn!("Ignoring unparseable {} header", USER_CONTEXT_HEADER);
                None
            }
        });

    AuthorizationContext::new(from_header.unwrap_or_else(|| body_context.clone()))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_context_overrides_body() {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_CONTEXT_HEADER,
            HeaderValue::from_static(r#"{"user_id": "hdr", "location": "EU"}"#),
        );
        let mut body = Map::new();
        body.insert("user_id".to_string(), json!("body"));

        assert_eq!(resolve_context(&headers, &body).subject_id(), "hdr");
    }

    #[test]
    fn test_unparseable_header_falls_back_to_body() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_CONTEXT_HEADER, HeaderValue::from_static("not json"));
        let mut body = Map::new();
        body.insert("user_id".to_string(), json!("body"));

        assert_eq!(resolve_context(&headers, &body).subject_id(), "body");
        assert_eq!(
            resolve_context(&HeaderMap::new(), &Map::new()).subject_id(),
            "anonymous"
        );
    }

    #[test]
    fn test_registration_status_mapping() {
        assert_eq!(
            registration_status(&DomainError::validation("empty urn")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            registration_status(&DomainError::embedding_unavailable("offline")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            registration_status(&DomainError::storage("disk")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_query_body_defaults() {
        let body: QueryBody = serde_json::from_str(r#"{"intent": "revenue"}"#).unwrap();
        let options = body.options();

        assert_eq!(options.limit(), 10);
        assert!(options.hard_filters().is_empty());
        assert!(options.overall_timeout().is_none());
    }
}
