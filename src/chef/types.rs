//! Chef server API types.
//!
//! These mirror the JSON bodies the server accepts and returns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Sort order the server uses when none is given.
pub const DEFAULT_SEARCH_SORT: &str = "X_CHEF_id_CHEF_X asc";

/// Response to a data bag creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataBagCreated {
    /// API URI of the new data bag.
    pub uri: String,
}

/// A Chef environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Environment {
    /// Environment name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Always `Chef::Environment`.
    #[serde(default = "default_json_class")]
    pub json_class: String,
    /// Always `environment`.
    #[serde(default = "default_chef_type")]
    pub chef_type: String,
    /// Default attributes applied to nodes in this environment.
    #[serde(default)]
    pub default_attributes: Map<String, Value>,
    /// Override attributes applied to nodes in this environment.
    #[serde(default)]
    pub override_attributes: Map<String, Value>,
    /// Cookbook name to version constraint.
    #[serde(default)]
    pub cookbook_versions: BTreeMap<String, String>,
}

fn default_json_class() -> String {
    String::from("Chef::Environment")
}

fn default_chef_type() -> String {
    String::from("environment")
}

impl Environment {
    /// Creates an environment with empty attributes and constraints.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            json_class: default_json_class(),
            chef_type: default_chef_type(),
            default_attributes: Map::new(),
            override_attributes: Map::new(),
            cookbook_versions: BTreeMap::new(),
        }
    }
}

/// A search against one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Index to search (`node`, `role`, `client`, `environment` or a data bag name).
    pub index: String,
    /// Solr query string.
    pub query: String,
    /// Sort expression.
    pub sort: String,
    /// Maximum number of rows.
    pub rows: u32,
    /// Offset of the first row.
    pub start: u32,
}

impl SearchQuery {
    /// Creates a query with the server's default paging and ordering.
    #[must_use]
    pub fn new(index: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            query: query.into(),
            sort: String::from(DEFAULT_SEARCH_SORT),
            rows: 1000,
            start: 0,
        }
    }

    /// Limits the number of rows.
    #[must_use]
    pub const fn with_rows(mut self, rows: u32) -> Self {
        self.rows = rows;
        self
    }

    /// Query-string parameters in the order the server documents them.
    #[must_use]
    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("q", self.query.clone()),
            ("rows", self.rows.to_string()),
            ("sort", self.sort.clone()),
            ("start", self.start.to_string()),
        ]
    }
}

/// Search response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// Total number of matches, independent of paging.
    pub total: u64,
    /// Offset of the first returned row.
    #[serde(default)]
    pub start: u64,
    /// Returned rows.
    #[serde(default)]
    pub rows: Vec<Value>,
}
