use std::sync::Arc;

use async_trait::async_trait;

use crate::application::{PolicyEvaluator, PolicyInput};
use crate::domain::{AccessRule, DomainError, PolicyLanguage};

/// Routes each rule to the first registered evaluator that supports its language.
#[derive(Default)]
pub struct PolicyRouter {
    evaluators: Vec<Arc<dyn PolicyEvaluator>>,
}

impl PolicyRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn PolicyEvaluator>) -> Self {
        self.evaluators.push(evaluator);
        self
    }

    fn route(&self, language: PolicyLanguage) -> Option<&Arc<dyn PolicyEvaluator>> {
        self.evaluators.iter().find(|e| e.supports(language))
    }
}

#[async_trait]
impl PolicyEvaluator for PolicyRouter {
    async fn evaluate(&self, rule: &AccessRule, input: &PolicyInput) -> Result<bool, DomainError> {
        match self.route(rule.language()) {
            Some(evaluator) => evaluator.evaluate(rule, input).await,
            None => Err(DomainError::policy(format!(
                "No evaluator configured for {} rules",
                rule.language().as_str()
            ))),
        }
    }

    fn supports(&self, language: PolicyLanguage) -> bool {
        self.route(language).is_some()
    }
}
