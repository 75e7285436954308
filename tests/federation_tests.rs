//! End-to-end tests for discovery, governance and federated dispatch.
//!
//! Every remote source is a scripted in-process client, so these tests exercise
//! the real registry, guard and orchestrator without any network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use fedcatalog::{
    AccessRule, AttributeRuleEvaluator, AuditEventKind, AuthorizationContext, DescriptorStore,
    DomainError, FederationOrchestrator, HardFilters, InMemoryAuditSink, InMemoryDescriptorStore,
    MockEmbedding, PolicyRouter, ProvLineageStamper, QueryOptions, RemoteSourceClient,
    SemanticRegistry, SensitivityClass, SourceDescriptor, SourceStatus, SovereigntyGuard,
    StaticSourceClients, TranslatedRequest,
};

const INTENT: &str = "quarterly revenue by region";

enum Behaviour {
    Answer { delay: Duration, payload: Value },
    Fail,
    Hang,
    Panic,
}

struct ScriptedSource {
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }

    fn answering(delay_ms: u64) -> Arc<Self> {
        Self::new(Behaviour::Answer {
            delay: Duration::from_millis(delay_ms),
            payload: json!([{ "rows": 1 }]),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSourceClient for ScriptedSource {
    async fn query(&self, request: &TranslatedRequest, _deadline: Instant) -> Result<Value, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Answer { delay, payload } => {
                tokio::time::sleep(*delay).await;
                Ok(payload.clone())
            }
            Behaviour::Fail => Err(DomainError::source_query(format!(
                "{} answered with HTTP 502",
                request.source_urn()
            ))),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Value::Null)
            }
            Behaviour::Panic => panic!("source client crashed"),
        }
    }
}

/// Store that fails every call, standing in for an unreachable database.
struct BrokenStore;

#[async_trait]
impl DescriptorStore for BrokenStore {
    async fn upsert(&self, _descriptor: &SourceDescriptor) -> Result<(), DomainError> {
        Err(DomainError::storage("store offline"))
    }

    async fn delete(&self, _urn: &str) -> Result<bool, DomainError> {
        Err(DomainError::storage("store offline"))
    }

    async fn get(&self, _urn: &str) -> Result<Option<SourceDescriptor>, DomainError> {
        Err(DomainError::storage("store offline"))
    }

    async fn search(
        &self,
        _query_vector: &[f32],
        _filters: &HardFilters,
        _limit: usize,
    ) -> Result<Vec<(SourceDescriptor, f32)>, DomainError> {
        Err(DomainError::storage("store offline"))
    }

    async fn list(&self) -> Result<Vec<SourceDescriptor>, DomainError> {
        Err(DomainError::storage("store offline"))
    }

    async fn count(&self) -> Result<u64, DomainError> {
        Err(DomainError::storage("store offline"))
    }
}

struct TestEnv {
    registry: Arc<SemanticRegistry>,
    orchestrator: FederationOrchestrator,
    audit: Arc<InMemoryAuditSink>,
}

fn setup_with_store(store: Arc<dyn DescriptorStore>, clients: StaticSourceClients) -> TestEnv {
    let registry = Arc::new(SemanticRegistry::new(store, Arc::new(MockEmbedding::new())));
    let audit = Arc::new(InMemoryAuditSink::new());
    let evaluator =
        Arc::new(PolicyRouter::new().with_evaluator(Arc::new(AttributeRuleEvaluator::new())));
    let guard = Arc::new(SovereigntyGuard::new(evaluator, audit.clone()));
    let orchestrator =
        FederationOrchestrator::new(registry.clone(), guard, Arc::new(clients), audit.clone())
            .with_lineage(Arc::new(ProvLineageStamper::new()));

    TestEnv {
        registry,
        orchestrator,
        audit,
    }
}

fn setup(clients: StaticSourceClients) -> TestEnv {
    setup_with_store(Arc::new(InMemoryDescriptorStore::new()), clients)
}

fn source(urn: &str, description: &str, geography: &str) -> SourceDescriptor {
    SourceDescriptor::new(
        urn,
        urn.trim_start_matches("urn:src:"),
        description,
        format!("sse://sources.test/{}", urn),
        geography,
        SensitivityClass::Internal,
        "finance",
        AccessRule::attribute("subject.location == object.geography"),
    )
}

fn eu_analyst() -> AuthorizationContext {
    AuthorizationContext::new(serde_json::Map::new())
        .with_attribute("user_id", "analyst-1")
        .with_attribute("location", "EU")
}

fn fast_options() -> QueryOptions {
    QueryOptions::new().with_per_source_timeout(Duration::from_millis(300))
}

async fn candidate_order(env: &TestEnv, filters: &HardFilters) -> Vec<String> {
    env.registry
        .find_candidates(INTENT, filters, 10)
        .await
        .expect("candidates")
        .urns()
        .into_iter()
        .map(String::from)
        .collect()
}

#[tokio::test]
async fn test_denied_source_is_never_called_or_revealed() {
    let eu = ScriptedSource::answering(0);
    let us = ScriptedSource::answering(0);
    let env = setup(
        StaticSourceClients::new()
            .with_client("urn:src:eu-sales", eu.clone())
            .with_client("urn:src:us-sales", us.clone()),
    );
    env.registry
        .register(source("urn:src:eu-sales", "quarterly revenue by region", "EU"))
        .await
        .unwrap();
    env.registry
        .register(source("urn:src:us-sales", "quarterly revenue by region", "US"))
        .await
        .unwrap();

    let response = env
        .orchestrator
        .dispatch_query(INTENT, &eu_analyst(), &fast_options())
        .await
        .unwrap();

    assert_eq!(response.urns(), vec!["urn:src:eu-sales"]);
    assert_eq!(response.results()[0].status(), SourceStatus::Success);
    assert!(!response.is_partial());
    assert_eq!(eu.calls(), 1);
    assert_eq!(us.calls(), 0);

    let denials = env.audit.events_of(AuditEventKind::PolicyDenied);
    assert_eq!(denials.len(), 1);
    assert_eq!(denials[0].urn(), Some("urn:src:us-sales"));
    assert_eq!(denials[0].subject_id(), "analyst-1");
    assert_eq!(denials[0].query_id(), Some(response.query_id()));

    let body = serde_json::to_string(&response).unwrap();
    assert!(!body.contains("us-sales"));
}

#[tokio::test]
async fn test_slow_source_times_out_and_order_is_kept() {
    let first = ScriptedSource::answering(120);
    let slow = ScriptedSource::new(Behaviour::Hang);
    let last = ScriptedSource::answering(0);
    let env = setup(
        StaticSourceClients::new()
            .with_client("urn:src:revenue", first.clone())
            .with_client("urn:src:revenue-archive", slow.clone())
            .with_client("urn:src:headcount", last.clone()),
    );
    env.registry
        .register(source("urn:src:revenue", "quarterly revenue by region", "EU"))
        .await
        .unwrap();
    env.registry
        .register(source("urn:src:revenue-archive", "quarterly revenue archive", "EU"))
        .await
        .unwrap();
    env.registry
        .register(source("urn:src:headcount", "headcount by region", "EU"))
        .await
        .unwrap();
    let expected_order = candidate_order(&env, &HardFilters::new()).await;

    let started = Instant::now();
    let response = env
        .orchestrator
        .dispatch_query(INTENT, &eu_analyst(), &fast_options())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(response.urns(), expected_order);
    assert!(response.is_partial());
    for result in response.results() {
        let expected = if result.source_urn() == "urn:src:revenue-archive" {
            SourceStatus::Timeout
        } else {
            SourceStatus::Success
        };
        assert_eq!(result.status(), expected, "{}", result.source_urn());
    }
    assert_eq!(response.count_with_status(SourceStatus::Timeout), 1);
}

#[tokio::test]
async fn test_evaluation_failure_denies_without_dispatch() {
    let client = ScriptedSource::answering(0);
    let env = setup(StaticSourceClients::new().with_client("urn:src:broken-rule", client.clone()));
    let descriptor = SourceDescriptor::new(
        "urn:src:broken-rule",
        "Broken rule",
        "quarterly revenue by region",
        "sse://sources.test/broken",
        "EU",
        SensitivityClass::Internal,
        "finance",
        AccessRule::attribute("subject.location == "),
    );
    env.registry.register(descriptor).await.unwrap();

    let response = env
        .orchestrator
        .dispatch_query(INTENT, &eu_analyst(), &fast_options())
        .await
        .unwrap();

    assert!(response.results().is_empty());
    assert!(!response.is_partial());
    assert_eq!(client.calls(), 0);
    assert_eq!(
        env.audit.events_of(AuditEventKind::PolicyEvaluationFailed).len(),
        1
    );
}

#[tokio::test]
async fn test_acl_mismatch_is_denied_and_service_account_passes() {
    let client = ScriptedSource::answering(0);
    let env = setup(StaticSourceClients::new().with_client("urn:src:payroll", client.clone()));
    env.registry
        .register(
            source("urn:src:payroll", "quarterly revenue by region", "EU")
                .with_acls(vec!["finance".to_string()]),
        )
        .await
        .unwrap();

    let outsider = eu_analyst().with_attribute("groups", json!(["hr"]));
    let denied = env
        .orchestrator
        .dispatch_query(INTENT, &outsider, &fast_options())
        .await
        .unwrap();
    assert!(denied.results().is_empty());
    assert_eq!(client.calls(), 0);
    let denials = env.audit.events_of(AuditEventKind::PolicyDenied);
    assert_eq!(denials[0].rule_id(), Some("acl"));

    let service = eu_analyst().with_attribute("is_service_account", true);
    let allowed = env
        .orchestrator
        .dispatch_query(INTENT, &service, &fast_options())
        .await
        .unwrap();
    assert_eq!(allowed.urns(), vec!["urn:src:payroll"]);
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn test_reregistration_replaces_entry() {
    let env = setup(StaticSourceClients::new());
    env.registry
        .register(source("urn:src:sales", "headcount by office", "EU"))
        .await
        .unwrap();
    env.registry
        .register(source("urn:src:sales", "quarterly revenue by region", "EU"))
        .await
        .unwrap();

    assert_eq!(env.registry.count().await.unwrap(), 1);
    let stored = env.registry.get("urn:src:sales").await.unwrap().unwrap();
    assert_eq!(stored.description(), "quarterly revenue by region");

    let candidates = env
        .registry
        .find_candidates(INTENT, &HardFilters::new(), 10)
        .await
        .unwrap();
    assert_eq!(candidates.urns(), vec!["urn:src:sales"]);
}

#[tokio::test]
async fn test_excluded_sensitivity_is_filtered_before_governance() {
    let open = ScriptedSource::answering(0);
    let locked = ScriptedSource::answering(0);
    let env = setup(
        StaticSourceClients::new()
            .with_client("urn:src:open", open.clone())
            .with_client("urn:src:locked", locked.clone()),
    );
    env.registry
        .register(source("urn:src:open", "quarterly revenue by region", "EU"))
        .await
        .unwrap();
    let locked_descriptor = SourceDescriptor::new(
        "urn:src:locked",
        "Locked",
        "quarterly revenue by region",
        "sse://sources.test/locked",
        "EU",
        SensitivityClass::RegulatedLocked,
        "finance",
        AccessRule::attribute("true"),
    );
    env.registry.register(locked_descriptor).await.unwrap();

    let options = fast_options().with_hard_filters(
        HardFilters::new().excluding_sensitivity(SensitivityClass::RegulatedLocked),
    );
    let response = env
        .orchestrator
        .dispatch_query(INTENT, &eu_analyst(), &options)
        .await
        .unwrap();

    assert_eq!(response.urns(), vec!["urn:src:open"]);
    assert_eq!(locked.calls(), 0);
    assert!(env.audit.is_empty());
}

#[tokio::test]
async fn test_deregister_is_idempotent() {
    let env = setup(StaticSourceClients::new());
    env.registry
        .register(source("urn:src:gone", "quarterly revenue by region", "EU"))
        .await
        .unwrap();

    env.registry.deregister("urn:src:gone").await.unwrap();
    env.registry.deregister("urn:src:gone").await.unwrap();
    env.registry.deregister("urn:src:never-existed").await.unwrap();

    assert_eq!(env.registry.count().await.unwrap(), 0);
    let response = env
        .orchestrator
        .dispatch_query(INTENT, &eu_analyst(), &fast_options())
        .await
        .unwrap();
    assert!(response.results().is_empty());
}

#[tokio::test]
async fn test_overall_deadline_cancels_in_flight_sources() {
    let a = ScriptedSource::new(Behaviour::Hang);
    let b = ScriptedSource::new(Behaviour::Hang);
    let env = setup(
        StaticSourceClients::new()
            .with_client("urn:src:a", a.clone())
            .with_client("urn:src:b", b.clone()),
    );
    env.registry
        .register(source("urn:src:a", "quarterly revenue by region", "EU"))
        .await
        .unwrap();
    env.registry
        .register(source("urn:src:b", "regional revenue per quarter", "EU"))
        .await
        .unwrap();

    let options = QueryOptions::new()
        .with_per_source_timeout(Duration::from_secs(20))
        .with_overall_timeout(Duration::from_millis(200));
    let started = Instant::now();
    let response = env
        .orchestrator
        .dispatch_query(INTENT, &eu_analyst(), &options)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(response.results().len(), 2);
    assert_eq!(response.count_with_status(SourceStatus::Timeout), 2);
    assert!(response.is_partial());
}

#[tokio::test]
async fn test_total_failure_is_partial() {
    let env = setup(
        StaticSourceClients::new()
            .with_client("urn:src:a", ScriptedSource::new(Behaviour::Fail))
            .with_client("urn:src:b", ScriptedSource::new(Behaviour::Panic)),
    );
    env.registry
        .register(source("urn:src:a", "quarterly revenue by region", "EU"))
        .await
        .unwrap();
    env.registry
        .register(source("urn:src:b", "regional revenue per quarter", "EU"))
        .await
        .unwrap();

    let response = env
        .orchestrator
        .dispatch_query(INTENT, &eu_analyst(), &fast_options())
        .await
        .unwrap();

    assert_eq!(response.results().len(), 2);
    assert_eq!(response.success_count(), 0);
    assert_eq!(response.count_with_status(SourceStatus::Error), 2);
    assert!(response.is_partial());
    for result in response.results() {
        assert!(result.payload().is_none());
        assert!(result.detail().is_some());
    }
}

#[tokio::test]
async fn test_missing_client_fails_only_that_source() {
    let known = ScriptedSource::answering(0);
    let env = setup(StaticSourceClients::new().with_client("urn:src:known", known.clone()));
    env.registry
        .register(source("urn:src:known", "quarterly revenue by region", "EU"))
        .await
        .unwrap();
    env.registry
        .register(source("urn:src:unknown", "regional revenue per quarter", "EU"))
        .await
        .unwrap();

    let response = env
        .orchestrator
        .dispatch_query(INTENT, &eu_analyst(), &fast_options())
        .await
        .unwrap();

    assert_eq!(response.results().len(), 2);
    assert_eq!(response.success_count(), 1);
    assert!(response.is_partial());
    let unknown = response
        .results()
        .iter()
        .find(|r| r.source_urn() == "urn:src:unknown")
        .unwrap();
    assert_eq!(unknown.status(), SourceStatus::Error);
}

#[tokio::test]
async fn test_systemic_failure_aborts_and_is_audited() {
    let env = setup_with_store(Arc::new(BrokenStore), StaticSourceClients::new());

    let err = env
        .orchestrator
        .dispatch_query(INTENT, &eu_analyst(), &fast_options())
        .await
        .unwrap_err();

    assert!(err.is_systemic());
    let events = env.audit.events_of(AuditEventKind::SystemicError);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].subject_id(), "analyst-1");
}

#[tokio::test]
async fn test_stamped_response_records_successful_sources() {
    let env = setup(
        StaticSourceClients::new()
            .with_client("urn:src:ok", ScriptedSource::answering(0))
            .with_client("urn:src:down", ScriptedSource::new(Behaviour::Fail)),
    );
    env.registry
        .register(source("urn:src:ok", "quarterly revenue by region", "EU"))
        .await
        .unwrap();
    env.registry
        .register(source("urn:src:down", "regional revenue per quarter", "EU"))
        .await
        .unwrap();

    let stamped = env
        .orchestrator
        .dispatch_stamped(INTENT, &eu_analyst(), &fast_options())
        .await
        .unwrap();

    let lineage = stamped.lineage().expect("lineage envelope").as_json();
    assert_eq!(lineage["@graph"][0]["prov:used"], json!(["urn:src:ok"]));
    assert_eq!(
        lineage["@graph"][1]["fedcatalog:queryId"],
        stamped.response().query_id().to_string()
    );

    let body = serde_json::to_value(&stamped).unwrap();
    assert!(body["lineage"].is_object());
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_no_candidates_is_empty_not_partial() {
    let env = setup(StaticSourceClients::new());

    let response = env
        .orchestrator
        .dispatch_query(INTENT, &eu_analyst(), &fast_options())
        .await
        .unwrap();

    assert!(response.results().is_empty());
    assert!(!response.is_partial());
    assert!(env.audit.is_empty());
}
