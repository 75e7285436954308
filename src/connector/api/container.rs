use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::application::{
    AuditSink, DescriptorStore, EmbeddingProvider, FederationOrchestrator, ListSourcesUseCase,
    PolicyEvaluator, SemanticRegistry, SourceClientProvider, SovereigntyGuard,
};
use crate::connector::{
    AttributeRuleEvaluator, DuckdbDescriptorStore, InMemoryDescriptorStore, MockEmbedding,
    OpaPolicyEvaluator, OrtEmbedding, PolicyRouter, ProvLineageStamper, SseClientPool,
    TracingAuditSink, DEFAULT_DIMENSIONS,
};

pub const DATABASE_FILE: &str = "fedcatalog.duckdb";

pub struct ContainerConfig {
    pub data_dir: String,
    pub memory_storage: bool,
    pub mock_embeddings: bool,
    /// HuggingFace model id for ONNX embeddings. Ignored with mock embeddings.
    pub embedding_model: Option<String>,
    pub dimensions: Option<usize>,
    /// Explicit `opa` binary; discovered from the environment when unset.
    pub opa_path: Option<PathBuf>,
}

impl ContainerConfig {
    /// Fully in-process configuration: memory storage and mock embeddings.
    pub fn in_memory() -> Self {
        Self {
            data_dir: String::new(),
            memory_storage: true,
            mock_embeddings: true,
            embedding_model: None,
            dimensions: None,
            opa_path: None,
        }
    }
}

/// Builds and owns every collaborator. Front doors borrow use cases from here.
pub struct Container {
    registry: Arc<SemanticRegistry>,
    orchestrator: Arc<FederationOrchestrator>,
    config: ContainerConfig,
}

impl Container {
    pub fn new(config: ContainerConfig) -> Result<Self> {
        let dimensions = config.dimensions.unwrap_or(DEFAULT_DIMENSIONS);

        let embedding_provider: Arc<dyn EmbeddingProvider> = if config.mock_embeddings {
            debug!("Using mock embedding provider ({} dimensions)", dimensions);
            Arc::new(MockEmbedding::with_dimensions(dimensions))
        } else {
            debug!("Initializing ONNX embedding provider...");
            Arc::new(OrtEmbedding::new(
                config.embedding_model.as_deref(),
                Some(dimensions),
            )?)
        };

        let store: Arc<dyn DescriptorStore> = if config.memory_storage {
            debug!("Using in-memory descriptor storage");
            Arc::new(InMemoryDescriptorStore::new())
        } else {
            let db_path = PathBuf::from(&config.data_dir).join(DATABASE_FILE);
            debug!("Using DuckDB descriptor storage at {:?}", db_path);
            Arc::new(DuckdbDescriptorStore::new(&db_path, dimensions)?)
        };

        let evaluator: Arc<dyn PolicyEvaluator> = Arc::new(
            PolicyRouter::new()
                .with_evaluator(Arc::new(AttributeRuleEvaluator::new()))
                .with_evaluator(Arc::new(OpaPolicyEvaluator::new(config.opa_path.clone()))),
        );
        let audit_sink: Arc<dyn AuditSink> = Arc::new(TracingAuditSink::new());
        let clients: Arc<dyn SourceClientProvider> = Arc::new(SseClientPool::new());

        Ok(Self::from_parts(
            store,
            embedding_provider,
            evaluator,
            clients,
            audit_sink,
            config,
        ))
    }

    /// Wires the use cases from caller-supplied collaborators.
    pub fn from_parts(
        store: Arc<dyn DescriptorStore>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        evaluator: Arc<dyn PolicyEvaluator>,
        clients: Arc<dyn SourceClientProvider>,
        audit_sink: Arc<dyn AuditSink>,
        config: ContainerConfig,
    ) -> Self {
        let registry = Arc::new(SemanticRegistry::new(store, embedding_provider));
        let guard = Arc::new(SovereigntyGuard::new(evaluator, audit_sink.clone()));
        let orchestrator = Arc::new(
            FederationOrchestrator::new(registry.clone(), guard, clients, audit_sink)
                .with_lineage(Arc::new(ProvLineageStamper::new())),
        );

        Self {
            registry,
            orchestrator,
            config,
        }
    }

    pub fn registry(&self) -> Arc<SemanticRegistry> {
        self.registry.clone()
    }

    pub fn orchestrator(&self) -> Arc<FederationOrchestrator> {
        self.orchestrator.clone()
    }

    pub fn list_use_case(&self) -> ListSourcesUseCase {
        ListSourcesUseCase::new(self.registry.clone())
    }

    pub fn data_dir(&self) -> &str {
        &self.config.data_dir
    }

    pub fn memory_storage(&self) -> bool {
        self.config.memory_storage
    }
}
