//! Provider surface for the host orchestration runtime.
//!
//! The runtime owns diffing, locking and state persistence. It talks to this
//! crate one request at a time: each line on the input is a JSON
//! [`ProviderRequest`], and each answer is one JSON [`ProviderResponse`] line
//! on the output. A failed operation produces an `error` response; the loop
//! only stops at end of input or on a transport failure.
//!
//! ```text
//! > {"operation":"create","resource":"data_bag","properties":{"name":"users"}}
//! < {"status":"ok","id":"users","properties":{"api_uri":"https://…/data/users","name":"users"}}
//! > {"operation":"read","resource":"environment","id":"gone","properties":{}}
//! < {"status":"ok","id":null,"properties":{}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

use crate::chef::ChefApi;
use crate::error::{ChefResourcesError, Result};
use crate::resources::{ResourceData, ResourceKind, ResourceSchema, all_schemas, resource_for};

/// A single request from the host runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ProviderRequest {
    /// Describe every resource kind.
    Schema,
    /// Create a resource from desired properties.
    Create {
        /// Resource kind.
        resource: ResourceKind,
        /// Desired properties.
        #[serde(default)]
        properties: Map<String, Value>,
    },
    /// Refresh a resource, or evaluate a data source.
    Read {
        /// Resource kind.
        resource: ResourceKind,
        /// Recorded id; data sources do not need one.
        #[serde(default)]
        id: Option<String>,
        /// Recorded (or, for data sources, desired) properties.
        #[serde(default)]
        properties: Map<String, Value>,
    },
    /// Update a resource in place.
    Update {
        /// Resource kind.
        resource: ResourceKind,
        /// Recorded id.
        id: String,
        /// Desired properties.
        #[serde(default)]
        properties: Map<String, Value>,
    },
    /// Delete a resource.
    Delete {
        /// Resource kind.
        resource: ResourceKind,
        /// Recorded id.
        id: String,
        /// Recorded properties.
        #[serde(default)]
        properties: Map<String, Value>,
    },
    /// Adopt an existing remote object.
    Import {
        /// Resource kind.
        resource: ResourceKind,
        /// Import id (format depends on the kind).
        id: String,
    },
}

impl ProviderRequest {
    /// Name of the requested operation.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Create { .. } => "create",
            Self::Read { .. } => "read",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Import { .. } => "import",
        }
    }
}

/// Answer to a [`ProviderRequest`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderResponse {
    /// Resulting state. A `null` id means the resource is absent.
    Ok {
        /// Remote identity.
        id: Option<String>,
        /// Resulting properties.
        properties: Map<String, Value>,
    },
    /// Resource schemas.
    Schema {
        /// One schema per kind.
        resources: Vec<ResourceSchema>,
    },
    /// The operation failed.
    Error {
        /// Error message, verbatim from the failing layer.
        message: String,
    },
}

impl From<ResourceData> for ProviderResponse {
    fn from(data: ResourceData) -> Self {
        Self::Ok {
            id: data.id,
            properties: data.properties,
        }
    }
}

impl From<&ChefResourcesError> for ProviderResponse {
    fn from(err: &ChefResourcesError) -> Self {
        Self::Error {
            message: err.to_string(),
        }
    }
}

/// Dispatches provider requests to the resource reconcilers.
#[derive(Debug)]
pub struct Provider<A> {
    /// Chef server API.
    api: A,
}

impl<A: ChefApi> Provider<A> {
    /// Creates a provider backed by the given API.
    #[must_use]
    pub const fn new(api: A) -> Self {
        Self { api }
    }

    /// Handles one request, turning failures into error responses.
    pub async fn handle(&self, request: ProviderRequest) -> ProviderResponse {
        let operation = request.operation();
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                error!("{operation} failed: {e}");
                ProviderResponse::from(&e)
            }
        }
    }

    /// Runs one request.
    ///
    /// # Errors
    ///
    /// Returns the reconciler's error unchanged.
    pub async fn dispatch(&self, request: ProviderRequest) -> Result<ProviderResponse> {
        match request {
            ProviderRequest::Schema => Ok(ProviderResponse::Schema {
                resources: all_schemas(),
            }),
            ProviderRequest::Create {
                resource,
                properties,
            } => {
                info!("create {resource}");
                let reconciler = resource_for(resource);
                let mut data = ResourceData::new(properties);
                reconciler.schema().prepare(&mut data.properties)?;
                reconciler.create(&self.api, &mut data).await?;
                Ok(data.into())
            }
            ProviderRequest::Read {
                resource,
                id,
                properties,
            } => {
                info!("read {resource} {}", id.as_deref().unwrap_or("-"));
                let reconciler = resource_for(resource);
                let schema = reconciler.schema();
                let mut data = ResourceData { id, properties };
                if schema.data_source {
                    schema.prepare(&mut data.properties)?;
                } else {
                    schema.apply_defaults(&mut data.properties);
                }
                reconciler.read(&self.api, &mut data).await?;
                Ok(data.into())
            }
            ProviderRequest::Update {
                resource,
                id,
                properties,
            } => {
                info!("update {resource} {id}");
                let reconciler = resource_for(resource);
                let mut data = ResourceData::with_id(id, properties);
                reconciler.schema().prepare(&mut data.properties)?;
                reconciler.update(&self.api, &mut data).await?;
                Ok(data.into())
            }
            ProviderRequest::Delete {
                resource,
                id,
                properties,
            } => {
                info!("delete {resource} {id}");
                let mut data = ResourceData::with_id(id, properties);
                resource_for(resource).delete(&self.api, &mut data).await?;
                Ok(data.into())
            }
            ProviderRequest::Import { resource, id } => {
                info!("import {resource} {id}");
                let data = resource_for(resource).import(&self.api, &id).await?;
                Ok(data.into())
            }
        }
    }

    /// Serves line-delimited requests until the input ends.
    ///
    /// Returns the number of requests answered.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading or writing the transport fails.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();
        let mut handled = 0;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            let line = buf.trim_ascii();
            if line.is_empty() {
                continue;
            }

            let response = match serde_json::from_slice::<ProviderRequest>(line) {
                Ok(request) => self.handle(request).await,
                Err(e) => {
                    debug!("Rejected request line: {}", String::from_utf8_lossy(line));
                    ProviderResponse::Error {
                        message: format!("Invalid request: {e}"),
                    }
                }
            };

            let mut encoded = serde_json::to_vec(&response).map_err(|e| {
                ChefResourcesError::internal(format!("Failed to encode response: {e}"))
            })?;
            encoded.push(b'\n');
            writer.write_all(&encoded).await?;
            writer.flush().await?;
            handled += 1;
        }

        info!("Input closed after {handled} requests");
        Ok(handled)
    }
}
