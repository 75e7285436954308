use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::{
    AuditSink, LineageStamper, RemoteSourceClient, SemanticRegistry, SourceClientProvider,
    SovereigntyGuard, TranslatedRequest,
};
use crate::domain::{
    intent_digest, AggregatedResponse, AuditEvent, AuthorizationContext, DispatchPlan,
    DispatchTarget, DomainError, QueryOptions, SourceResult, StampedResponse,
};

/// Discover, govern, dispatch and aggregate.
///
/// Authorization always completes for the whole candidate set before the first
/// remote call is issued. Results come back in registry relevance order no matter
/// which source answers first.
pub struct FederationOrchestrator {
    registry: Arc<SemanticRegistry>,
    guard: Arc<SovereigntyGuard>,
    clients: Arc<dyn SourceClientProvider>,
    audit_sink: Arc<dyn AuditSink>,
    lineage_stamper: Option<Arc<dyn LineageStamper>>,
}

impl FederationOrchestrator {
    pub fn new(
        registry: Arc<SemanticRegistry>,
        guard: Arc<SovereigntyGuard>,
        clients: Arc<dyn SourceClientProvider>,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            registry,
            guard,
            clients,
            audit_sink,
            lineage_stamper: None,
        }
    }

    pub fn with_lineage(mut self, stamper: Arc<dyn LineageStamper>) -> Self {
        self.lineage_stamper = Some(stamper);
        self
    }

    /// Runs one federated query. Fails only when discovery cannot complete; source
    /// failures are reported inside the response.
    pub async fn dispatch_query(
        &self,
        intent: &str,
        context: &AuthorizationContext,
        options: &QueryOptions,
    ) -> Result<AggregatedResponse, DomainError> {
        self.execute(Uuid::new_v4(), intent, context, options).await
    }

    /// `dispatch_query` followed by lineage stamping. A stamping failure is logged and
    /// the response is returned without an envelope.
    pub async fn dispatch_stamped(
        &self,
        intent: &str,
        context: &AuthorizationContext,
        options: &QueryOptions,
    ) -> Result<StampedResponse, DomainError> {
        let response = self.dispatch_query(intent, context, options).await?;

        let lineage = match self.lineage_stamper {
            Some(ref stamper) => match stamper.stamp(&response, &intent_digest(intent)) {
                Ok(envelope) => Some(envelope),
                Err(e) => {
                    warn!(
                        "Lineage stamping failed for query {}: {}",
                        response.query_id(),
                        e
                    );
                    None
                }
            },
            None => None,
        };

        Ok(StampedResponse::new(response, lineage))
    }

    async fn execute(
        &self,
        query_id: Uuid,
        intent: &str,
        context: &AuthorizationContext,
        options: &QueryOptions,
    ) -> Result<AggregatedResponse, DomainError> {
        let start_time = Instant::now();
        let overall_deadline = options.overall_timeout().map(|t| start_time + t);
        let subject_id = context.subject_id();

        info!(
            "Processing query {} for {} (intent {})",
            query_id,
            subject_id,
            &intent_digest(intent)[..12]
        );

        let candidates = match self
            .registry
            .find_candidates(intent, options.hard_filters(), options.limit())
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                error!("Discovery failed for query {}: {}", query_id, e);
                self.audit_sink.record(AuditEvent::systemic(
                    Some(query_id),
                    subject_id,
                    e.to_string(),
                ));
                return Err(e);
            }
        };
        info!("Found {} candidate sources", candidates.len());

        let outcome = self
            .guard
            .authorize_query(Some(query_id), candidates, context)
            .await;
        debug!(
            "{} candidates withheld by governance for query {}",
            outcome.blocked().len(),
            query_id
        );
        let plan = outcome.into_plan();
        info!("Allowed {} sources after governance check", plan.len());

        if plan.is_empty() {
            return Ok(AggregatedResponse::empty(query_id));
        }

        let results = self
            .fan_out(query_id, intent, plan, options, overall_deadline)
            .await;
        let response = AggregatedResponse::assemble(query_id, results);

        info!(
            "Query {} finished: {} of {} sources succeeded (partial={}) in {:.2}s",
            query_id,
            response.success_count(),
            response.results().len(),
            response.is_partial(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(response)
    }

    /// One task per target. Each task owns its own deadline; the collector owns the
    /// overall one and aborts whatever is still running when it passes.
    async fn fan_out(
        &self,
        query_id: Uuid,
        intent: &str,
        plan: DispatchPlan,
        options: &QueryOptions,
        overall_deadline: Option<Instant>,
    ) -> Vec<SourceResult> {
        let targets: Vec<DispatchTarget> = plan.into_iter().collect();
        let dispatch_start = Instant::now();
        let mut slots: Vec<Option<SourceResult>> = vec![None; targets.len()];
        let mut tasks: JoinSet<(usize, SourceResult)> = JoinSet::new();

        for (index, target) in targets.iter().enumerate() {
            let client = match self.clients.client_for(target) {
                Ok(client) => client,
                Err(e) => {
                    warn!("No client available for {}: {}", target.urn(), e);
                    slots[index] = Some(SourceResult::error(
                        target.urn(),
                        e.to_string(),
                        dispatch_start.elapsed(),
                    ));
                    continue;
                }
            };

            let request = client.translate(query_id, intent, target);
            let mut deadline = Instant::now() + options.per_source_timeout();
            if let Some(overall) = overall_deadline {
                deadline = deadline.min(overall);
            }

            tasks.spawn(async move { (index, query_source(client, request, deadline).await) });
        }

        let drained = match overall_deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, drain(&mut tasks, &mut slots))
                .await
                .is_ok(),
            None => {
                drain(&mut tasks, &mut slots).await;
                true
            }
        };

        if !drained {
            warn!(
                "Overall deadline reached for query {}; cancelling {} in-flight sources",
                query_id,
                tasks.len()
            );
            tasks.abort_all();
        }

        let elapsed = dispatch_start.elapsed();
        slots
            .into_iter()
            .zip(targets.iter())
            .map(|(slot, target)| {
                slot.unwrap_or_else(|| {
                    if drained {
                        SourceResult::error(target.urn(), "dispatch task failed", elapsed)
                    } else {
                        SourceResult::timeout(target.urn(), elapsed)
                    }
                })
            })
            .collect()
    }
}

async fn drain(tasks: &mut JoinSet<(usize, SourceResult)>, slots: &mut [Option<SourceResult>]) {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(e) => warn!("Dispatch task did not complete: {}", e),
        }
    }
}

async fn query_source(
    client: Arc<dyn RemoteSourceClient>,
    request: TranslatedRequest,
    deadline: Instant,
) -> SourceResult {
    let start = Instant::now();
    let urn = request.source_urn().to_string();

    match tokio::time::timeout_at(deadline, client.query(&request, deadline)).await {
        Ok(Ok(payload)) => {
            debug!("Source {} answered in {:?}", urn, start.elapsed());
            SourceResult::success(urn, payload, start.elapsed())
        }
        Ok(Err(e)) if e.is_timeout() => {
            warn!("Query to {} timed out: {}", urn, e);
            SourceResult::timeout(urn, start.elapsed())
        }
        Ok(Err(e)) => {
            warn!("Query to {} failed: {}", urn, e);
            SourceResult::error(urn, e.to_string(), start.elapsed())
        }
        Err(_) => {
            warn!("Query to {} timed out after {:?}", urn, start.elapsed());
            SourceResult::timeout(urn, start.elapsed())
        }
    }
}
