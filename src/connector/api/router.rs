use anyhow::Result;

use crate::Commands;

use super::container::Container;
use super::controller::{
    DeregisterController, ListSourcesController, QueryController, QueryRequest,
    RegisterController,
};

pub struct Router<'a> {
    register_controller: RegisterController<'a>,
    deregister_controller: DeregisterController<'a>,
    list_sources_controller: ListSourcesController<'a>,
    query_controller: QueryController<'a>,
}

impl<'a> Router<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self {
            register_controller: RegisterController::new(container),
            deregister_controller: DeregisterController::new(container),
            list_sources_controller: ListSourcesController::new(container),
            query_controller: QueryController::new(container),
        }
    }

    pub async fn route(&self, command: Commands) -> Result<String> {
        match command {
            Commands::Register { manifest } => self.register_controller.register(manifest).await,
            Commands::Deregister { urn } => self.deregister_controller.deregister(urn).await,
            Commands::List {
                geography,
                owner_group,
                json,
            } => {
                self.list_sources_controller
                    .list(geography, owner_group, json)
                    .await
            }
            Commands::Query {
                intent,
                subject,
                subject_json,
                geography,
                sensitivity,
                exclude_sensitivity,
                owner_group,
                limit,
                timeout_ms,
                overall_timeout_ms,
                json,
            } => {
                self.query_controller
                    .query(QueryRequest {
                        intent,
                        subject,
                        subject_json,
                        geography,
                        sensitivity,
                        exclude_sensitivity,
                        owner_group,
                        limit,
                        timeout_ms,
                        overall_timeout_ms,
                        json,
                    })
                    .await
            }
            Commands::Serve { .. } => unreachable!("Serve command is handled separately in main"),
        }
    }
}
