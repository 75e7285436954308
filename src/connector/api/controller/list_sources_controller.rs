use anyhow::Result;

use crate::{HardFilters, SourceDescriptor};

use super::super::Container;

pub struct ListSourcesController<'a> {
    container: &'a Container,
}

impl<'a> ListSourcesController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn list(
        &self,
        geography: Option<String>,
        owner_group: Option<String>,
        json: bool,
    ) -> Result<String> {
        let mut filters = HardFilters::new();
        if let Some(geography) = geography {
            filters = filters.with_geography(geography);
        }
        if let Some(owner_group) = owner_group {
            filters = filters.with_owner_group(owner_group);
        }

        let sources = self.container.list_use_case().execute(&filters).await?;

        if json {
            return Ok(serde_json::to_string_pretty(&sources)?);
        }
        Ok(self.format_source_list(&sources))
    }

    fn format_source_list(&self, sources: &[SourceDescriptor]) -> String {
        if sources.is_empty() {
            return "No sources registered.".to_string();
        }

        let mut output = format!("Registered sources ({}):\n\n", sources.len());
        for source in sources {
            output.push_str(&format!("  {} ({})\n", source.display_name(), source.urn()));
            output.push_str(&format!("    Endpoint: {}\n", source.endpoint()));
            output.push_str(&format!(
                "    Geography: {}, Sensitivity: {}, Owner: {}\n",
                source.geography(),
                source.sensitivity_class(),
                source.owner_group()
            ));
            output.push_str(&format!(
                "    Access rule: {} ({})\n",
                source.access_rule().language().as_str(),
                source.access_rule().rule_id()
            ));
            if !source.acls().is_empty() {
                output.push_str(&format!("    ACLs: {}\n", source.acls().join(", ")));
            }
            output.push('\n');
        }

        output
    }
}
