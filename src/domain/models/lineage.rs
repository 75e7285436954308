use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::AggregatedResponse;

/// Audit envelope produced by a lineage stamper. Not interpreted by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineageEnvelope(Value);

impl LineageEnvelope {
    pub fn new(document: Value) -> Self {
        Self(document)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }
}

/// A response enriched with its lineage envelope, when stamping succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StampedResponse {
    #[serde(flatten)]
    response: AggregatedResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lineage: Option<LineageEnvelope>,
}

impl StampedResponse {
    pub fn new(response: AggregatedResponse, lineage: Option<LineageEnvelope>) -> Self {
        Self { response, lineage }
    }

    pub fn response(&self) -> &AggregatedResponse {
        &self.response
    }

    pub fn lineage(&self) -> Option<&LineageEnvelope> {
        self.lineage.as_ref()
    }

    pub fn into_response(self) -> AggregatedResponse {
        self.response
    }
}

/// SHA-256 of the intent text, hex encoded.
pub fn intent_digest(intent: &str) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(intent.as_bytes());
    format!("{:x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_digest() {
        let digest = intent_digest("quarterly revenue by region");

        assert_eq!(digest.len(), 64);
        assert_eq!(digest, intent_digest("quarterly revenue by region"));
        assert_ne!(digest, intent_digest("quarterly revenue by country"));
    }
}
