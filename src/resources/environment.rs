//! Environment reconciler.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::chef::{ChefApi, Environment};
use crate::error::{ResourceError, Result};

use super::json::{canonical_string, parse_object};
use super::schema::{FieldSchema, ResourceSchema};
use super::{Resource, ResourceData, ResourceKind};

const KIND: ResourceKind = ResourceKind::Environment;

/// Description used when none is configured.
pub const DEFAULT_ENVIRONMENT_DESCRIPTION: &str = "Managed by chef-resources";

/// Reconciler for `environment` resources.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvironmentResource;

impl EnvironmentResource {
    /// Builds the server body from resource properties.
    fn to_environment(data: &ResourceData) -> Result<Environment> {
        let mut environment = Environment::new(data.require_str(KIND, "name")?);
        environment.description = data
            .get_str("description")
            .unwrap_or(DEFAULT_ENVIRONMENT_DESCRIPTION)
            .to_string();
        environment.default_attributes = parse_object(
            "default_attributes_json",
            data.get_str("default_attributes_json").unwrap_or_default(),
        )?;
        environment.override_attributes = parse_object(
            "override_attributes_json",
            data.get_str("override_attributes_json").unwrap_or_default(),
        )?;
        environment.cookbook_versions = cookbook_constraints(data)?;
        Ok(environment)
    }

    /// Writes the server's view into the resource properties.
    fn apply(environment: Environment, data: &mut ResourceData) {
        data.set("name", environment.name);
        data.set("description", environment.description);
        data.set(
            "default_attributes_json",
            canonical_string(&Value::Object(environment.default_attributes)),
        );
        data.set(
            "override_attributes_json",
            canonical_string(&Value::Object(environment.override_attributes)),
        );
        let constraints: Map<String, Value> = environment
            .cookbook_versions
            .into_iter()
            .map(|(cookbook, version)| (cookbook, Value::String(version)))
            .collect();
        data.set("cookbook_constraints", constraints);
    }
}

fn cookbook_constraints(data: &ResourceData) -> Result<BTreeMap<String, String>> {
    let Some(value) = data.properties.get("cookbook_constraints") else {
        return Ok(BTreeMap::new());
    };
    if value.is_null() {
        return Ok(BTreeMap::new());
    }

    let invalid = || ResourceError::InvalidField {
        kind: KIND.to_string(),
        field: String::from("cookbook_constraints"),
        expected: String::from("a map of strings"),
    };

    value
        .as_object()
        .ok_or_else(invalid)?
        .iter()
        .map(|(cookbook, version)| {
            version
                .as_str()
                .map(|v| (cookbook.clone(), v.to_string()))
                .ok_or_else(|| invalid().into())
        })
        .collect()
}

#[async_trait]
impl Resource for EnvironmentResource {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::resource(
            KIND,
            vec![
                FieldSchema::string("name")
                    .required()
                    .force_new()
                    .describe("Name of the environment"),
                FieldSchema::string("description")
                    .optional()
                    .default_value(DEFAULT_ENVIRONMENT_DESCRIPTION)
                    .describe("Free-form description"),
                FieldSchema::string("default_attributes_json")
                    .optional()
                    .json()
                    .default_value("{}")
                    .describe("Default attributes as a JSON object"),
                FieldSchema::string("override_attributes_json")
                    .optional()
                    .json()
                    .default_value("{}")
                    .describe("Override attributes as a JSON object"),
                FieldSchema::string_map("cookbook_constraints")
                    .optional()
                    .default_value(Map::new())
                    .describe("Cookbook name to version constraint"),
            ],
        )
    }

    async fn create(&self, api: &dyn ChefApi, data: &mut ResourceData) -> Result<()> {
        let environment = Self::to_environment(data)?;
        info!("Creating environment: {}", environment.name);

        api.create_environment(&environment).await?;

        data.set_id(&environment.name);
        self.read(api, data).await
    }

    async fn read(&self, api: &dyn ChefApi, data: &mut ResourceData) -> Result<()> {
        let name = data.require_id(KIND, "read")?.to_string();
        info!("Reading environment: {name}");

        match api.get_environment(&name).await {
            Ok(environment) => {
                Self::apply(environment, data);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("Environment {name} not found, treating as absent");
                data.clear_id();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn update(&self, api: &dyn ChefApi, data: &mut ResourceData) -> Result<()> {
        let environment = Self::to_environment(data)?;
        info!("Updating environment: {}", environment.name);

        api.update_environment(&environment).await?;

        data.set_id(&environment.name);
        self.read(api, data).await
    }

    async fn delete(&self, api: &dyn ChefApi, data: &mut ResourceData) -> Result<()> {
        let name = data.require_id(KIND, "delete")?.to_string();
        info!("Deleting environment: {name}");

        api.delete_environment(&name).await?;
        data.clear_id();
        Ok(())
    }
}
