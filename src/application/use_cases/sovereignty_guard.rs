use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::{AuditSink, PolicyEvaluator, PolicyInput};
use crate::domain::{
    AuditEvent, AuthorizationContext, AuthorizationOutcome, Candidate, CandidateSet, DispatchPlan,
    DispatchTarget, SourceResult,
};

/// Rule identifier recorded when a source's group ACL denies the subject.
pub const ACL_RULE_ID: &str = "acl";

enum Decision {
    Allow,
    Deny { rule_id: String },
    Failed { rule_id: String, reason: String },
}

/// Per-candidate authorization. Denied candidates never reach the dispatch plan.
pub struct SovereigntyGuard {
    evaluator: Arc<dyn PolicyEvaluator>,
    audit_sink: Arc<dyn AuditSink>,
}

impl SovereigntyGuard {
    pub fn new(evaluator: Arc<dyn PolicyEvaluator>, audit_sink: Arc<dyn AuditSink>) -> Self {
        Self {
            evaluator,
            audit_sink,
        }
    }

    pub async fn authorize(
        &self,
        candidates: CandidateSet,
        context: &AuthorizationContext,
    ) -> AuthorizationOutcome {
        self.authorize_query(None, candidates, context).await
    }

    /// Evaluates every candidate concurrently and keeps the allowed ones in their
    /// original order. Evaluator failures deny the candidate.
    pub async fn authorize_query(
        &self,
        query_id: Option<Uuid>,
        candidates: CandidateSet,
        context: &AuthorizationContext,
    ) -> AuthorizationOutcome {
        let candidates: Vec<Candidate> = candidates.into_iter().collect();
        let decisions = join_all(candidates.iter().map(|c| self.decide(c, context))).await;

        let subject_id = context.subject_id();
        let mut targets = Vec::new();
        let mut blocked = Vec::new();

        for (candidate, decision) in candidates.iter().zip(decisions) {
            match decision {
                Decision::Allow => {
                    debug!("Source {} allowed for {}", candidate.urn(), subject_id);
                    targets.push(DispatchTarget::from_candidate(candidate));
                }
                Decision::Deny { rule_id } => {
                    warn!(
                        "Source {} blocked by policy {} for {}",
                        candidate.urn(),
                        rule_id,
                        subject_id
                    );
                    self.audit_sink.record(AuditEvent::denied(
                        query_id,
                        subject_id.clone(),
                        candidate.urn(),
                        rule_id,
                    ));
                    blocked.push(SourceResult::blocked(candidate.urn()));
                }
                Decision::Failed { rule_id, reason } => {
                    error!(
                        "Policy evaluation failed for {} (rule {}): {}",
                        candidate.urn(),
                        rule_id,
                        reason
                    );
                    self.audit_sink.record(AuditEvent::evaluation_failed(
                        query_id,
                        subject_id.clone(),
                        candidate.urn(),
                        rule_id,
                        reason,
                    ));
                    blocked.push(SourceResult::blocked(candidate.urn()));
                }
            }
        }

        AuthorizationOutcome::new(DispatchPlan::new(targets), blocked)
    }

    async fn decide(&self, candidate: &Candidate, context: &AuthorizationContext) -> Decision {
        let descriptor = candidate.descriptor();

        if !acl_permits(descriptor.acls(), context) {
            return Decision::Deny {
                rule_id: ACL_RULE_ID.to_string(),
            };
        }

        let rule = descriptor.access_rule();
        let input = PolicyInput::for_query(context, descriptor);
        match self.evaluator.evaluate(rule, &input).await {
            Ok(true) => Decision::Allow,
            Ok(false) => Decision::Deny {
                rule_id: rule.rule_id(),
            },
            Err(e) => Decision::Failed {
                rule_id: rule.rule_id(),
                reason: e.to_string(),
            },
        }
    }
}

/// Empty ACLs impose no group restriction. Service accounts bypass group checks.
fn acl_permits(acls: &[String], context: &AuthorizationContext) -> bool {
    if acls.is_empty() || context.is_service_account() {
        return true;
    }
    let groups = context.groups();
    acls.iter().any(|acl| groups.contains(&acl.as_str()))
}
