use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde_json::{Map, Value};

use crate::{
    AuthorizationContext, HardFilters, QueryOptions, SensitivityClass, SourceStatus,
    StampedResponse,
};

use super::super::Container;

/// Everything the `query` command collects from the command line.
pub struct QueryRequest {
    pub intent: String,
    pub subject: Vec<String>,
    pub subject_json: Option<String>,
    pub geography: Option<String>,
    pub sensitivity: Vec<String>,
    pub exclude_sensitivity: Vec<String>,
    pub owner_group: Option<String>,
    pub limit: usize,
    pub timeout_ms: u64,
    pub overall_timeout_ms: Option<u64>,
    pub json: bool,
}

pub struct QueryController<'a> {
    container: &'a Container,
}

impl<'a> QueryController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn query(&self, request: QueryRequest) -> Result<String> {
        let context = build_context(request.subject_json.as_deref(), &request.subject)?;

        let mut filters = HardFilters::new();
        if let Some(geography) = request.geography {
            filters = filters.with_geography(geography);
        }
        if let Some(owner_group) = request.owner_group {
            filters = filters.with_owner_group(owner_group);
        }
        for class in &request.sensitivity {
            filters = filters.with_sensitivity(class.parse::<SensitivityClass>()?);
        }
        for class in &request.exclude_sensitivity {
            filters = filters.excluding_sensitivity(class.parse::<SensitivityClass>()?);
        }

        let mut options = QueryOptions::new()
            .with_hard_filters(filters)
            .with_limit(request.limit)
            .with_per_source_timeout(Duration::from_millis(request.timeout_ms));
        if let Some(ms) = request.overall_timeout_ms {
            options = options.with_overall_timeout(Duration::from_millis(ms));
        }

        let stamped = self
            .container
            .orchestrator()
            .dispatch_stamped(&request.intent, &context, &options)
            .await?;

        if request.json {
            return Ok(serde_json::to_string_pretty(&stamped)?);
        }
        Ok(self.format_response(&stamped))
    }

    fn format_response(&self, stamped: &StampedResponse) -> String {
        let response = stamped.response();
        if response.results().is_empty() {
            return format!("Query {}: no sources answered.", response.query_id());
        }

        let mut output = format!(
            "Query {}: {} of {} sources succeeded{}\n\n",
            response.query_id(),
            response.success_count(),
            response.results().len(),
            if response.is_partial() { " (partial)" } else { "" }
        );

        for (i, result) in response.results().iter().enumerate() {
            output.push_str(&format!(
                "{}. {} [{}] {:.1}ms\n",
                i + 1,
                result.source_urn(),
                result.status().as_str(),
                result.latency_ms()
            ));
            match result.status() {
                SourceStatus::Success => {
                    let rows = result
                        .payload()
                        .and_then(Value::as_array)
                        .map_or(0, Vec::len);
                    output.push_str(&format!("   {} events\n", rows));
                }
                _ => {
                    if let Some(detail) = result.detail() {
                        output.push_str(&format!("   {}\n", detail));
                    }
                }
            }
        }

        output
    }
}

/// Builds subject attributes from an optional JSON object overlaid with `key=value`
/// pairs. Pair values that parse as JSON keep their type, anything else is a string.
pub fn build_context(subject_json: Option<&str>, pairs: &[String]) -> Result<AuthorizationContext> {
    let mut attributes = match subject_json {
        Some(text) => match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => map,
            _ => bail!("--subject-json must be a JSON object"),
        },
        None => Map::new(),
    };

    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Subject attribute '{}' is not KEY=VALUE", pair))?;
        let value =
            serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        attributes.insert(key.trim().to_string(), value);
    }

    Ok(AuthorizationContext::new(attributes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_context_overlays_pairs() {
        let context = build_context(
            Some(r#"{"user_id": "u1", "location": "US"}"#),
            &["location=EU".to_string(), "groups=[\"finance\"]".to_string()],
        )
        .unwrap();

        assert_eq!(context.attribute("location"), Some(&json!("EU")));
        assert_eq!(context.groups(), vec!["finance"]);
        assert_eq!(context.subject_id(), "u1");
    }

    #[test]
    fn test_build_context_rejects_bad_input() {
        assert!(build_context(Some("[1]"), &[]).is_err());
        assert!(build_context(None, &["novalue".to_string()]).is_err());
    }
}
