//! Resource reconcilers.
//!
//! Each kind maps one declarative resource onto Chef server objects and
//! implements the create/read/update/delete/import contract against
//! [`ChefApi`]. Results land in a uniform [`ResourceData`]: an optional id and
//! a flat property map. A read that finds nothing clears the id rather than
//! failing, so the host runtime can plan a re-create.

mod data_bag;
mod data_bag_item;
mod environment;
mod json;
mod schema;
mod search;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::chef::ChefApi;
use crate::error::{ResourceError, Result};

pub use data_bag::DataBagResource;
pub use data_bag_item::{DataBagItemResource, locate_item, prepare_item_content};
pub use environment::{DEFAULT_ENVIRONMENT_DESCRIPTION, EnvironmentResource};
pub use json::{canonical_string, flatten_value, normalize_json, parse_object};
pub use schema::{FieldSchema, FieldType, ResourceSchema};
pub use search::{SEARCH_ID, SearchDataSource};

/// Kinds of resources this crate manages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A data bag.
    DataBag,
    /// An item inside a data bag.
    DataBagItem,
    /// An environment.
    Environment,
    /// A search query (read-only data source).
    Search,
}

impl ResourceKind {
    /// Every kind, in dependency order.
    pub const ALL: [Self; 4] = [
        Self::DataBag,
        Self::DataBagItem,
        Self::Environment,
        Self::Search,
    ];

    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DataBag => "data_bag",
            Self::DataBagItem => "data_bag_item",
            Self::Environment => "environment",
            Self::Search => "search",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform local state of one resource instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    /// Remote identity; `None` means the resource is absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Flat property map described by the kind's schema.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl ResourceData {
    /// Creates data with no id.
    #[must_use]
    pub const fn new(properties: Map<String, Value>) -> Self {
        Self {
            id: None,
            properties,
        }
    }

    /// Creates data that refers to an existing remote object.
    #[must_use]
    pub fn with_id(id: impl Into<String>, properties: Map<String, Value>) -> Self {
        Self {
            id: Some(id.into()),
            properties,
        }
    }

    /// Returns true if the resource is absent.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        self.id.is_none()
    }

    /// Records the remote identity.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Marks the resource absent.
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    /// Sets a property.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.properties.insert(field.to_string(), value.into());
    }

    /// Gets a string property.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.properties.get(field).and_then(Value::as_str)
    }

    /// Gets a string property that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::MissingField`] if it is absent or not a string.
    pub fn require_str(&self, kind: ResourceKind, field: &str) -> Result<&str> {
        self.get_str(field).ok_or_else(|| {
            ResourceError::MissingField {
                kind: kind.to_string(),
                field: field.to_string(),
            }
            .into()
        })
    }

    /// Gets the id, which the given operation needs.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::MissingId`] if the resource has no id.
    pub fn require_id(&self, kind: ResourceKind, operation: &str) -> Result<&str> {
        self.id.as_deref().ok_or_else(|| {
            ResourceError::MissingId {
                kind: kind.to_string(),
                operation: operation.to_string(),
            }
            .into()
        })
    }
}

/// The create/read/update/delete/import contract of a resource kind.
///
/// Operations mutate `data` in place. `read` clears the id when the remote
/// object is gone. `delete` clears it on success.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Kind implemented by this reconciler.
    fn kind(&self) -> ResourceKind;

    /// Schema exposed to the host runtime.
    fn schema(&self) -> ResourceSchema;

    /// Creates the remote object described by `data`.
    async fn create(&self, api: &dyn ChefApi, data: &mut ResourceData) -> Result<()> {
        let _ = (api, data);
        Err(ResourceError::unsupported(self.kind().as_str(), "create").into())
    }

    /// Refreshes `data` from the remote object.
    async fn read(&self, api: &dyn ChefApi, data: &mut ResourceData) -> Result<()>;

    /// Updates the remote object in place.
    async fn update(&self, api: &dyn ChefApi, data: &mut ResourceData) -> Result<()> {
        let _ = (api, data);
        Err(ResourceError::unsupported(self.kind().as_str(), "update").into())
    }

    /// Deletes the remote object.
    async fn delete(&self, api: &dyn ChefApi, data: &mut ResourceData) -> Result<()> {
        let _ = (api, data);
        Err(ResourceError::unsupported(self.kind().as_str(), "delete").into())
    }

    /// Adopts an existing remote object by id.
    ///
    /// The default takes the id as-is and reads the object.
    async fn import(&self, api: &dyn ChefApi, id: &str) -> Result<ResourceData> {
        if !self.schema().importable {
            return Err(ResourceError::unsupported(self.kind().as_str(), "import").into());
        }

        let mut data = ResourceData::with_id(id, Map::new());
        self.read(api, &mut data).await?;
        ensure_imported(self.kind(), id, data)
    }
}

/// Fails an import whose read found nothing.
///
/// # Errors
///
/// Returns [`ResourceError::NotFound`] if `data` is absent.
pub fn ensure_imported(kind: ResourceKind, id: &str, data: ResourceData) -> Result<ResourceData> {
    if data.is_absent() {
        return Err(ResourceError::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
        .into());
    }
    info!("Imported {kind} '{id}'");
    Ok(data)
}

/// Builds the data that addresses an existing object by its import id.
///
/// # Errors
///
/// Returns an error if the id has the wrong shape for the kind.
pub fn locate(kind: ResourceKind, id: &str) -> Result<ResourceData> {
    match kind {
        ResourceKind::DataBagItem => locate_item(id),
        _ => Ok(ResourceData::with_id(id, Map::new())),
    }
}

/// Returns the reconciler for a kind.
#[must_use]
pub fn resource_for(kind: ResourceKind) -> &'static dyn Resource {
    match kind {
        ResourceKind::DataBag => &DataBagResource,
        ResourceKind::DataBagItem => &DataBagItemResource,
        ResourceKind::Environment => &EnvironmentResource,
        ResourceKind::Search => &SearchDataSource,
    }
}

/// Schemas of every kind.
#[must_use]
pub fn all_schemas() -> Vec<ResourceSchema> {
    ResourceKind::ALL
        .iter()
        .map(|kind| resource_for(*kind).schema())
        .collect()
}
