use serde::{Deserialize, Serialize};

use super::{Candidate, SourceResult};

/// What the dispatch layer knows about an authorized source. Access rules and
/// governance attributes stay behind in the guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchTarget {
    urn: String,
    display_name: String,
    endpoint: String,
    relevance_score: f32,
}

impl DispatchTarget {
    pub fn new(
        urn: impl Into<String>,
        display_name: impl Into<String>,
        endpoint: impl Into<String>,
        relevance_score: f32,
    ) -> Self {
        Self {
            urn: urn.into(),
            display_name: display_name.into(),
            endpoint: endpoint.into(),
            relevance_score,
        }
    }

    pub fn from_candidate(candidate: &Candidate) -> Self {
        let descriptor = candidate.descriptor();
        Self::new(
            descriptor.urn(),
            descriptor.display_name(),
            descriptor.endpoint(),
            candidate.relevance_score(),
        )
    }

    pub fn urn(&self) -> &str {
        &self.urn
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn relevance_score(&self) -> f32 {
        self.relevance_score
    }
}

/// Authorized targets in registry relevance order.
#[derive(Debug, Clone, Default)]
pub struct DispatchPlan {
    targets: Vec<DispatchTarget>,
}

impl DispatchPlan {
    pub fn new(targets: Vec<DispatchTarget>) -> Self {
        Self { targets }
    }

    pub fn targets(&self) -> &[DispatchTarget] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn urns(&self) -> Vec<&str> {
        self.targets.iter().map(DispatchTarget::urn).collect()
    }
}

impl IntoIterator for DispatchPlan {
    type Item = DispatchTarget;
    type IntoIter = std::vec::IntoIter<DispatchTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.into_iter()
    }
}

/// Result of authorizing a candidate set: the plan plus the internal-only record of
/// what was blocked.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationOutcome {
    plan: DispatchPlan,
    blocked: Vec<SourceResult>,
}

impl AuthorizationOutcome {
    pub fn new(plan: DispatchPlan, blocked: Vec<SourceResult>) -> Self {
        Self { plan, blocked }
    }

    pub fn plan(&self) -> &DispatchPlan {
        &self.plan
    }

    pub fn blocked(&self) -> &[SourceResult] {
        &self.blocked
    }

    pub fn into_plan(self) -> DispatchPlan {
        self.plan
    }
}
