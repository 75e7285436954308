use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::DomainError;

/// Data sensitivity classification carried by every source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensitivityClass {
    Public,
    Internal,
    #[serde(alias = "PII")]
    RestrictedPii,
    #[serde(alias = "GXP_LOCKED", alias = "GxP_LOCKED")]
    RegulatedLocked,
}

impl SensitivityClass {
    pub const ALL: [SensitivityClass; 4] = [
        SensitivityClass::Public,
        SensitivityClass::Internal,
        SensitivityClass::RestrictedPii,
        SensitivityClass::RegulatedLocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensitivityClass::Public => "PUBLIC",
            SensitivityClass::Internal => "INTERNAL",
            SensitivityClass::RestrictedPii => "RESTRICTED_PII",
            SensitivityClass::RegulatedLocked => "REGULATED_LOCKED",
        }
    }
}

impl fmt::Display for SensitivityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensitivityClass {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "PUBLIC" => Ok(SensitivityClass::Public),
            "INTERNAL" => Ok(SensitivityClass::Internal),
            "RESTRICTED_PII" | "PII" => Ok(SensitivityClass::RestrictedPii),
            "REGULATED_LOCKED" | "GXP_LOCKED" => Ok(SensitivityClass::RegulatedLocked),
            other => Err(DomainError::validation(format!(
                "Unknown sensitivity class '{}'",
                other
            ))),
        }
    }
}

/// Policy language an access rule is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PolicyLanguage {
    /// Built-in attribute expression language, e.g. `subject.location == object.geography`.
    Attribute,
    /// Open Policy Agent Rego, evaluated for `data.<package>.allow`.
    #[default]
    Rego,
}

impl PolicyLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyLanguage::Attribute => "attribute",
            PolicyLanguage::Rego => "rego",
        }
    }
}

/// Source-supplied access rule. Opaque to everything except the policy evaluator.
///
/// Manifests may give the rule either as `{"language": "...", "text": "..."}` or as a
/// bare string, which is taken to be Rego.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AccessRuleRepr")]
pub struct AccessRule {
    language: PolicyLanguage,
    text: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AccessRuleRepr {
    Bare(String),
    Tagged {
        #[serde(default)]
        language: PolicyLanguage,
        text: String,
    },
}

impl From<AccessRuleRepr> for AccessRule {
    fn from(repr: AccessRuleRepr) -> Self {
        match repr {
            AccessRuleRepr::Bare(text) => AccessRule::rego(text),
            AccessRuleRepr::Tagged { language, text } => AccessRule::new(language, text),
        }
    }
}

impl AccessRule {
    pub fn new(language: PolicyLanguage, text: impl Into<String>) -> Self {
        Self {
            language,
            text: text.into(),
        }
    }

    pub fn attribute(text: impl Into<String>) -> Self {
        Self::new(PolicyLanguage::Attribute, text)
    }

    pub fn rego(text: impl Into<String>) -> Self {
        Self::new(PolicyLanguage::Rego, text)
    }

    pub fn language(&self) -> PolicyLanguage {
        self.language
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Stable identifier for audit records: language plus a digest prefix of the rule text.
    pub fn rule_id(&self) -> String {
        use sha2::{Digest, Sha256};
        let digest = format!("{:x}", Sha256::digest(self.text.as_bytes()));
        format!("{}:{}", self.language.as_str(), &digest[..12])
    }
}

/// Registered metadata for one remote data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    urn: String,
    #[serde(alias = "name")]
    display_name: String,
    description: String,
    #[serde(alias = "endpoint_url")]
    endpoint: String,
    #[serde(alias = "geo_location")]
    geography: String,
    #[serde(alias = "sensitivity")]
    sensitivity_class: SensitivityClass,
    owner_group: String,
    #[serde(alias = "access_policy")]
    access_rule: AccessRule,
    /// Extra object attributes handed to the policy evaluator.
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
    /// Groups allowed to see the source. Empty means no group restriction.
    #[serde(default)]
    acls: Vec<String>,
    /// Derived from `description` by the registry; never accepted from input.
    #[serde(skip)]
    embedding: Vec<f32>,
}

impl SourceDescriptor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        urn: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        endpoint: impl Into<String>,
        geography: impl Into<String>,
        sensitivity_class: SensitivityClass,
        owner_group: impl Into<String>,
        access_rule: AccessRule,
    ) -> Self {
        Self {
            urn: urn.into(),
            display_name: display_name.into(),
            description: description.into(),
            endpoint: endpoint.into(),
            geography: geography.into(),
            sensitivity_class,
            owner_group: owner_group.into(),
            access_rule,
            attributes: BTreeMap::new(),
            acls: Vec::new(),
            embedding: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_acls(mut self, acls: Vec<String>) -> Self {
        self.acls = acls;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Attaches the embedding of `description`. Used by the registry and by store
    /// adapters reconstituting persisted entries.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn urn(&self) -> &str {
        &self.urn
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn geography(&self) -> &str {
        &self.geography
    }

    pub fn sensitivity_class(&self) -> SensitivityClass {
        self.sensitivity_class
    }

    pub fn owner_group(&self) -> &str {
        &self.owner_group
    }

    pub fn access_rule(&self) -> &AccessRule {
        &self.access_rule
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn acls(&self) -> &[String] {
        &self.acls
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty()
    }

    /// Checks the fields a source must carry before it can be indexed.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.urn.trim().is_empty() {
            return Err(DomainError::validation("urn must not be empty"));
        }
        if self.urn.chars().any(char::is_whitespace) {
            return Err(DomainError::validation(format!(
                "urn '{}' must not contain whitespace",
                self.urn
            )));
        }
        if self.description.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "description of {} must not be empty",
                self.urn
            )));
        }
        if self.endpoint.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "endpoint of {} must not be empty",
                self.urn
            )));
        }
        if self.access_rule.text().trim().is_empty() {
            return Err(DomainError::validation(format!(
                "access rule of {} must not be empty",
                self.urn
            )));
        }
        Ok(())
    }

    /// Object facts for policy evaluation. Governance attributes win over custom
    /// attributes of the same name.
    pub fn policy_object(&self) -> Map<String, Value> {
        let mut object: Map<String, Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        object.insert("urn".to_string(), Value::String(self.urn.clone()));
        object.insert(
            "geography".to_string(),
            Value::String(self.geography.clone()),
        );
        object.insert(
            "sensitivity_class".to_string(),
            Value::String(self.sensitivity_class.as_str().to_string()),
        );
        object.insert(
            "owner_group".to_string(),
            Value::String(self.owner_group.clone()),
        );
        object
    }
}
