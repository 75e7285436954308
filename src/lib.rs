pub mod application;
pub mod cli;
pub mod connector;
pub mod domain;

pub use cli::Commands;

pub use application::{
    AuditSink, DescriptorStore, EmbeddingProvider, FederationOrchestrator, LineageStamper,
    ListSourcesUseCase, PolicyEvaluator, PolicyInput, RemoteSourceClient, SemanticRegistry,
    SourceClientProvider, SovereigntyGuard, TranslatedRequest,
};

pub use connector::{
    AttributeRuleEvaluator, DuckdbDescriptorStore, FanoutAuditSink, InMemoryAuditSink,
    InMemoryDescriptorStore, MockEmbedding, OpaPolicyEvaluator, OrtEmbedding, PolicyRouter,
    ProvLineageStamper, SseClientPool, SseSourceClient, StaticSourceClients, TracingAuditSink,
};

pub use domain::{
    AccessRule, AggregatedResponse, AuditEvent, AuditEventKind, AuthorizationContext, Candidate,
    CandidateSet, DispatchPlan, DispatchTarget, DomainError, HardFilters, LineageEnvelope,
    PolicyLanguage, QueryOptions, SensitivityClass, SourceDescriptor, SourceResult, SourceStatus,
    StampedResponse,
};
