//! Declarative resource schemas.
//!
//! A schema tells the host runtime which properties a kind accepts, which of
//! them are computed by the server, and which force replacement. The same
//! schema fills defaults, normalizes JSON-encoded strings and rejects
//! malformed property sets before any request goes out.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ResourceError, Result};

use super::ResourceKind;
use super::json::normalize_json;

/// Value type of a property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    /// A string.
    String,
    /// A boolean.
    Bool,
    /// An integer.
    Int,
    /// An object whose values are all strings.
    StringMap,
    /// An array of strings.
    StringList,
    /// An array of nested blocks, order not significant.
    BlockSet {
        /// Fields of each block.
        fields: Vec<FieldSchema>,
    },
}

impl FieldType {
    /// Human-readable description used in error messages.
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Bool => "a boolean",
            Self::Int => "an integer",
            Self::StringMap => "a map of strings",
            Self::StringList => "a list of strings",
            Self::BlockSet { .. } => "a list of objects",
        }
    }

    /// Checks whether a JSON value conforms to this type.
    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::StringMap => value
                .as_object()
                .is_some_and(|m| m.values().all(Value::is_string)),
            Self::StringList => value
                .as_array()
                .is_some_and(|a| a.iter().all(Value::is_string)),
            Self::BlockSet { .. } => value
                .as_array()
                .is_some_and(|a| a.iter().all(Value::is_object)),
        }
    }
}

/// Schema of a single property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    /// Property name.
    pub name: &'static str,
    /// Value type.
    pub field_type: FieldType,
    /// Must be supplied by the caller.
    pub required: bool,
    /// May be supplied by the caller.
    pub optional: bool,
    /// Filled in from the server.
    pub computed: bool,
    /// Changing it requires destroying and recreating the resource.
    pub force_new: bool,
    /// Value used when the caller leaves it out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// String holds JSON that is stored in canonical form.
    pub normalize_json: bool,
    /// One-line description.
    pub description: &'static str,
}

impl FieldSchema {
    const fn base(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            default: None,
            normalize_json: false,
            description: "",
        }
    }

    /// A string property.
    #[must_use]
    pub const fn string(name: &'static str) -> Self {
        Self::base(name, FieldType::String)
    }

    /// A boolean property.
    #[must_use]
    pub const fn bool(name: &'static str) -> Self {
        Self::base(name, FieldType::Bool)
    }

    /// An integer property.
    #[must_use]
    pub const fn int(name: &'static str) -> Self {
        Self::base(name, FieldType::Int)
    }

    /// A map-of-strings property.
    #[must_use]
    pub const fn string_map(name: &'static str) -> Self {
        Self::base(name, FieldType::StringMap)
    }

    /// A list-of-strings property.
    #[must_use]
    pub const fn string_list(name: &'static str) -> Self {
        Self::base(name, FieldType::StringList)
    }

    /// A set of nested blocks.
    #[must_use]
    pub const fn block_set(name: &'static str, fields: Vec<FieldSchema>) -> Self {
        Self::base(name, FieldType::BlockSet { fields })
    }

    /// Marks the property as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the property as optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Marks the property as computed by the server.
    #[must_use]
    pub const fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    /// Marks the property as forcing replacement.
    #[must_use]
    pub const fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Marks the string as JSON to be normalized.
    #[must_use]
    pub const fn json(mut self) -> Self {
        self.normalize_json = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub const fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }
}

/// Schema of a resource kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSchema {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Read-only data source rather than a managed resource.
    pub data_source: bool,
    /// Supports import by id.
    pub importable: bool,
    /// Declared properties.
    pub fields: Vec<FieldSchema>,
}

impl ResourceSchema {
    /// Creates a managed, importable resource schema.
    #[must_use]
    pub const fn resource(kind: ResourceKind, fields: Vec<FieldSchema>) -> Self {
        Self {
            kind,
            data_source: false,
            importable: true,
            fields,
        }
    }

    /// Creates a read-only data source schema.
    #[must_use]
    pub const fn data_source(kind: ResourceKind, fields: Vec<FieldSchema>) -> Self {
        Self {
            kind,
            data_source: true,
            importable: false,
            fields,
        }
    }

    /// Fills missing (or null) properties that declare a default.
    pub fn apply_defaults(&self, properties: &mut Map<String, Value>) {
        for field in &self.fields {
            if let Some(default) = &field.default {
                let missing = properties.get(field.name).is_none_or(Value::is_null);
                if missing {
                    properties.insert(field.name.to_string(), default.clone());
                }
            }
        }
    }

    /// Rewrites JSON-encoded string properties into canonical form.
    pub fn normalize(&self, properties: &mut Map<String, Value>) {
        for field in self.fields.iter().filter(|f| f.normalize_json) {
            if let Some(Value::String(raw)) = properties.get_mut(field.name) {
                *raw = normalize_json(raw);
            }
        }
    }

    /// Checks required presence, value types and unknown properties.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self, properties: &Map<String, Value>) -> Result<()> {
        validate_fields(self.kind.as_str(), &self.fields, properties)
    }

    /// Applies defaults, normalizes and validates in one pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting properties are invalid.
    pub fn prepare(&self, properties: &mut Map<String, Value>) -> Result<()> {
        self.apply_defaults(properties);
        self.normalize(properties);
        self.validate(properties)
    }
}

fn validate_fields(kind: &str, fields: &[FieldSchema], properties: &Map<String, Value>) -> Result<()> {
    for name in properties.keys() {
        if !fields.iter().any(|f| f.name == name) {
            return Err(ResourceError::UnknownField {
                kind: kind.to_string(),
                field: name.clone(),
            }
            .into());
        }
    }

    for field in fields {
        match properties.get(field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    return Err(ResourceError::MissingField {
                        kind: kind.to_string(),
                        field: field.name.to_string(),
                    }
                    .into());
                }
            }
            Some(value) => {
                if !field.field_type.accepts(value) {
                    return Err(ResourceError::InvalidField {
                        kind: kind.to_string(),
                        field: field.name.to_string(),
                        expected: field.field_type.describe().to_string(),
                    }
                    .into());
                }
                if let (FieldType::BlockSet { fields: nested }, Value::Array(blocks)) =
                    (&field.field_type, value)
                {
                    for block in blocks.iter().filter_map(Value::as_object) {
                        validate_fields(kind, nested, block)?;
                    }
                }
            }
        }
    }

    Ok(())
}
