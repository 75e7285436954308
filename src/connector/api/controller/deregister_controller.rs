use anyhow::Result;

use super::super::Container;

pub struct DeregisterController<'a> {
    container: &'a Container,
}

impl<'a> DeregisterController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn deregister(&self, urn: String) -> Result<String> {
        let registry = self.container.registry();
        let existed = registry.get(&urn).await?.is_some();
        registry.deregister(&urn).await?;

        if existed {
            Ok(format!("Deregistered source: {}", urn))
        } else {
            Ok(format!("Source not registered: {}", urn))
        }
    }
}
