use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, warn};

use crate::application::{PolicyEvaluator, PolicyInput};
use crate::domain::{AccessRule, DomainError, PolicyLanguage};

pub const OPA_PATH_ENV: &str = "FEDCATALOG_OPA_PATH";
const DEFAULT_PACKAGE: &str = "match";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct EvalOutput {
    #[serde(default)]
    result: Vec<EvalResult>,
}

#[derive(Debug, Deserialize)]
struct EvalResult {
    #[serde(default)]
    expressions: Vec<EvalExpression>,
}

#[derive(Debug, Deserialize)]
struct EvalExpression {
    value: Value,
}

/// Evaluates Rego rules by shelling out to `opa eval`.
///
/// The rule is written to a temporary `.rego` file and queried for
/// `data.<package>.allow`; the policy input goes in on stdin. Rules without a
/// package declaration are placed in `package match`. An undefined or non-boolean
/// `allow` is a deny.
pub struct OpaPolicyEvaluator {
    opa_path: Option<PathBuf>,
    timeout: Duration,
}

impl OpaPolicyEvaluator {
    pub fn new(opa_path: Option<PathBuf>) -> Self {
        let opa_path = opa_path.or_else(Self::discover);
        match opa_path {
            Some(ref path) => debug!("Using OPA binary at {:?}", path),
            None => warn!("OPA binary not found. Rego policy evaluation will fail."),
        }
        Self {
            opa_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn opa_path(&self) -> Option<&Path> {
        self.opa_path.as_deref()
    }

    /// Looks for `opa` in `$FEDCATALOG_OPA_PATH`, then `$PATH`, then `bin/opa`, then
    /// `/usr/local/bin/opa`.
    pub fn discover() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(OPA_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.is_file() {
                return Some(path);
            }
        }

        if let Some(paths) = std::env::var_os("PATH") {
            if let Some(found) = std::env::split_paths(&paths)
                .map(|dir| dir.join("opa"))
                .find(|candidate| candidate.is_file())
            {
                return Some(found);
            }
        }

        ["bin/opa", "/usr/local/bin/opa"]
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.is_file())
    }

    async fn run_opa(&self, opa: &Path, policy: &str, query: &str, input: &[u8]) -> Result<Vec<u8>, DomainError> {
        let mut policy_file = tempfile::Builder::new()
            .prefix("fedcatalog-")
            .suffix(".rego")
            .tempfile()?;
        policy_file.write_all(policy.as_bytes())?;
        policy_file.flush()?;

        let mut child = Command::new(opa)
            .arg("eval")
            .arg("--format")
            .arg("json")
            .arg("-d")
            .arg(policy_file.path())
            .arg("-I")
            .arg(query)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DomainError::policy(format!("Failed to start OPA: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .await
                .map_err(|e| DomainError::policy(format!("Failed to send input to OPA: {}", e)))?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                DomainError::policy(format!(
                    "OPA execution timed out after {:?}",
                    self.timeout
                ))
            })?
            .map_err(|e| DomainError::policy(format!("OPA execution failed: {}", e)))?;

        if !output.status.success() {
            return Err(DomainError::policy(format!(
                "OPA exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl PolicyEvaluator for OpaPolicyEvaluator {
    async fn evaluate(&self, rule: &AccessRule, input: &PolicyInput) -> Result<bool, DomainError> {
        if rule.language() != PolicyLanguage::Rego {
            return Err(DomainError::policy(format!(
                "OPA evaluator cannot evaluate {} rules",
                rule.language().as_str()
            )));
        }
        let opa = self
            .opa_path
            .as_deref()
            .ok_or_else(|| DomainError::policy("OPA binary is not configured"))?;

        if rule.text().trim().is_empty() {
            error!("Empty Rego policy for rule {}", rule.rule_id());
            return Ok(false);
        }

        let (policy, package) = normalize_policy(rule.text());
        let query = format!("data.{}.allow", package);
        let input_json = serde_json::to_vec(input)
            .map_err(|e| DomainError::policy(format!("Failed to encode policy input: {}", e)))?;

        let stdout = self.run_opa(opa, &policy, &query, &input_json).await?;
        let output: EvalOutput = serde_json::from_slice(&stdout)
            .map_err(|e| DomainError::policy(format!("Failed to parse OPA output: {}", e)))?;

        let value = output
            .result
            .into_iter()
            .next()
            .and_then(|r| r.expressions.into_iter().next())
            .map(|e| e.value);

        match value {
            Some(Value::Bool(allowed)) => Ok(allowed),
            Some(other) => {
                warn!("Policy {} returned non-boolean value: {}", rule.rule_id(), other);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn supports(&self, language: PolicyLanguage) -> bool {
        language == PolicyLanguage::Rego
    }
}

/// Returns the policy text to load and the package to query.
fn normalize_policy(text: &str) -> (String, String) {
    let declared = text.lines().find_map(|line| {
        line.trim()
            .strip_prefix("package ")
            .map(|rest| {
                rest.trim()
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
                    .collect::<String>()
            })
            .filter(|name| !name.is_empty())
    });

    match declared {
        Some(package) => (text.to_string(), package),
        None => (
            format!("package {}\n\n{}", DEFAULT_PACKAGE, text),
            DEFAULT_PACKAGE.to_string(),
        ),
    }
}
