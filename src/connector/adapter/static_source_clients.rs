use std::collections::HashMap;
use std::sync::Arc;

use crate::application::{RemoteSourceClient, SourceClientProvider};
use crate::domain::{DispatchTarget, DomainError};

/// Fixed urn-to-client table for embedding applications that own their transports.
#[derive(Default)]
pub struct StaticSourceClients {
    clients: HashMap<String, Arc<dyn RemoteSourceClient>>,
}

impl StaticSourceClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, urn: impl Into<String>, client: Arc<dyn RemoteSourceClient>) -> Self {
        self.clients.insert(urn.into(), client);
        self
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl SourceClientProvider for StaticSourceClients {
    fn client_for(&self, target: &DispatchTarget) -> Result<Arc<dyn RemoteSourceClient>, DomainError> {
        self.clients
            .get(target.urn())
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("No client registered for {}", target.urn())))
    }
}
