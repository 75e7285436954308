use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{DomainError, SourceDescriptor};

use super::super::Container;

#[derive(Deserialize)]
#[serde(untagged)]
enum Manifest {
    Many(Vec<SourceDescriptor>),
    One(Box<SourceDescriptor>),
}

/// Parses a manifest holding either one descriptor object or an array of them.
pub fn parse_manifest(text: &str) -> Result<Vec<SourceDescriptor>, DomainError> {
    match serde_json::from_str::<Manifest>(text) {
        Ok(Manifest::Many(descriptors)) => Ok(descriptors),
        Ok(Manifest::One(descriptor)) => Ok(vec![*descriptor]),
        Err(e) => Err(DomainError::validation(format!("Malformed manifest: {}", e))),
    }
}

pub struct RegisterController<'a> {
    container: &'a Container,
}

impl<'a> RegisterController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn register(&self, manifest: String) -> Result<String> {
        let text = tokio::fs::read_to_string(&manifest)
            .await
            .with_context(|| format!("Failed to read manifest {}", manifest))?;
        let descriptors = parse_manifest(&text)?;
        if descriptors.is_empty() {
            return Ok("Manifest contains no sources.".to_string());
        }

        let urns = self.container.registry().register_batch(descriptors).await?;

        let mut output = format!("Registered {} sources:\n", urns.len());
        for urn in &urns {
            output.push_str(&format!("  {}\n", urn));
        }
        Ok(output)
    }
}
