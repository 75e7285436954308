use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::application::LineageStamper;
use crate::domain::{AggregatedResponse, DomainError, LineageEnvelope};

const PROV_NS: &str = "http://www.w3.org/ns/prov#";
const FEDCATALOG_NS: &str = "https://fedcatalog.dev/provenance#";
const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

/// W3C PROV-O JSON-LD lineage for a finished query.
///
/// The graph holds the query activity, which `prov:used` every source that
/// answered successfully, and the response entity generated by it.
#[derive(Debug, Default)]
pub struct ProvLineageStamper;

impl ProvLineageStamper {
    pub fn new() -> Self {
        Self
    }
}

impl LineageStamper for ProvLineageStamper {
    fn stamp(
        &self,
        response: &AggregatedResponse,
        intent_hash: &str,
    ) -> Result<LineageEnvelope, DomainError> {
        if intent_hash.is_empty() {
            return Err(DomainError::invalid_input("Intent hash must not be empty"));
        }

        let query_id = response.query_id();
        let activity_id = format!("urn:fedcatalog:activity:{}", query_id);
        let ended_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let mut activity = Map::new();
        activity.insert("@id".to_string(), json!(activity_id));
        activity.insert("@type".to_string(), json!("prov:Activity"));
        activity.insert(
            "prov:endedAtTime".to_string(),
            json!({ "@value": ended_at, "@type": "xsd:dateTime" }),
        );
        let used = response.successful_urns();
        if !used.is_empty() {
            activity.insert("prov:used".to_string(), json!(used));
        }

        let entity = json!({
            "@id": format!("urn:fedcatalog:entity:response:{}", query_id),
            "@type": "prov:Entity",
            "prov:wasGeneratedBy": activity_id,
            "fedcatalog:queryId": query_id.to_string(),
            "fedcatalog:intentHash": intent_hash,
        });

        Ok(LineageEnvelope::new(json!({
            "@context": {
                "prov": PROV_NS,
                "fedcatalog": FEDCATALOG_NS,
                "xsd": XSD_NS,
            },
            "@graph": [Value::Object(activity), entity],
        })))
    }
}
