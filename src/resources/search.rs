//! Search data source.
//!
//! Returns the first matching row of a query as a flat string map. Depending
//! on the index and search mode the row payload sits under `data` (partial
//! search), `raw_data` (data bag indexes) or is the row itself (full node,
//! role and environment objects).

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::chef::{ChefApi, SearchQuery};
use crate::error::{ChefApiError, ResourceError, Result};

use super::json::flatten_value;
use super::schema::{FieldSchema, ResourceSchema};
use super::{Resource, ResourceData, ResourceKind};

const KIND: ResourceKind = ResourceKind::Search;

/// Fixed id of every search result.
pub const SEARCH_ID: &str = "static";

/// Index searched when none is given.
const DEFAULT_INDEX: &str = "node";

/// Reconciler for the `search` data source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchDataSource;

/// Collects `filter` blocks into partial-search keys.
fn partial_keys(data: &ResourceData) -> Result<BTreeMap<String, Vec<String>>> {
    let mut keys = BTreeMap::new();
    let Some(blocks) = data.properties.get("filter").and_then(Value::as_array) else {
        return Ok(keys);
    };

    let invalid = || ResourceError::InvalidField {
        kind: KIND.to_string(),
        field: String::from("filter"),
        expected: String::from("a list of {name, value} objects"),
    };

    for block in blocks {
        let name = block.get("name").and_then(Value::as_str).ok_or_else(invalid)?;
        let path = block
            .get("value")
            .and_then(Value::as_array)
            .ok_or_else(invalid)?
            .iter()
            .map(|segment| segment.as_str().map(str::to_string).ok_or_else(invalid))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        keys.insert(name.to_string(), path);
    }
    Ok(keys)
}

/// Flattens the payload of one search row.
fn row_result(row: &Value) -> Result<Map<String, Value>> {
    let payload = ["data", "raw_data"]
        .iter()
        .find_map(|key| row.get(*key).filter(|v| !v.is_null()))
        .unwrap_or(row);

    let fields = payload.as_object().ok_or_else(|| {
        ChefApiError::invalid_response(format!("search row is not an object: {payload}"))
    })?;

    Ok(fields
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(flatten_value(value))))
        .collect())
}

#[async_trait]
impl Resource for SearchDataSource {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::data_source(
            KIND,
            vec![
                FieldSchema::string("index")
                    .optional()
                    .default_value(DEFAULT_INDEX)
                    .describe("Index to search: node, role, client, environment or a data bag"),
                FieldSchema::string("query")
                    .required()
                    .describe("Solr query"),
                FieldSchema::block_set(
                    "filter",
                    vec![
                        FieldSchema::string("name")
                            .required()
                            .describe("Key of the returned attribute"),
                        FieldSchema::string_list("value")
                            .required()
                            .describe("Attribute path"),
                    ],
                )
                .optional()
                .describe("Attributes to return through partial search"),
                FieldSchema::bool("unique")
                    .optional()
                    .default_value(false)
                    .describe("Fail unless exactly one object matches"),
                FieldSchema::string_map("result")
                    .computed()
                    .describe("First matching row, values flattened to strings"),
                FieldSchema::int("total_num")
                    .computed()
                    .describe("Total number of matches"),
            ],
        )
    }

    async fn read(&self, api: &dyn ChefApi, data: &mut ResourceData) -> Result<()> {
        let index = data.get_str("index").unwrap_or(DEFAULT_INDEX).to_string();
        let query = SearchQuery::new(index, data.require_str(KIND, "query")?).with_rows(1);
        let unique = data
            .properties
            .get("unique")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let keys = partial_keys(data)?;

        info!("Reading search {} for: {}", query.index, query.query);
        let result = if keys.is_empty() {
            api.search(&query).await?
        } else {
            debug!("Using partial search with {} keys", keys.len());
            api.partial_search(&query, &keys).await?
        };
        debug!("Search returned {} total results", result.total);

        if unique && result.total != 1 {
            return Err(ResourceError::SearchNotUnique {
                total: result.total,
            }
            .into());
        }

        let flattened = match result.rows.first() {
            Some(row) if result.total > 0 => row_result(row)?,
            _ => Map::new(),
        };

        data.set_id(SEARCH_ID);
        data.set("total_num", result.total);
        data.set("result", flattened);
        Ok(())
    }
}
