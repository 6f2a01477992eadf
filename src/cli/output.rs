//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde_json::Value;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::resources::{FieldSchema, ResourceData, ResourceKind, ResourceSchema};

use super::commands::OutputFormat;

/// Widest value shown in a text table cell.
const MAX_CELL_WIDTH: usize = 60;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Schema field row for table display.
#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    name: String,
    #[tabled(rename = "Type")]
    field_type: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Property row for table display.
#[derive(Tabled)]
struct PropertyRow {
    #[tabled(rename = "Property")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats resource schemas for display.
    #[must_use]
    pub fn format_schemas(&self, schemas: &[ResourceSchema]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(schemas).unwrap_or_default(),
            OutputFormat::Text => schemas.iter().map(Self::format_schema_text).collect(),
        }
    }

    fn format_schema_text(schema: &ResourceSchema) -> String {
        let mut output = String::new();

        let role = if schema.data_source {
            "data source"
        } else if schema.importable {
            "resource, importable"
        } else {
            "resource"
        };
        let _ = writeln!(output, "\n{} ({role})", schema.kind.to_string().bold());

        let mut rows = Vec::new();
        for field in &schema.fields {
            Self::collect_field_rows(field, "", &mut rows);
        }
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');
        output
    }

    fn collect_field_rows(field: &FieldSchema, prefix: &str, rows: &mut Vec<FieldRow>) {
        let name = format!("{prefix}{}", field.name);

        let mut mode = Vec::new();
        if field.required {
            mode.push("required");
        }
        if field.optional {
            mode.push("optional");
        }
        if field.computed {
            mode.push("computed");
        }
        if field.force_new {
            mode.push("force-new");
        }

        rows.push(FieldRow {
            name: name.clone(),
            field_type: field.field_type.describe().to_string(),
            mode: mode.join(", "),
            description: field.description.to_string(),
        });

        if let crate::resources::FieldType::BlockSet { fields } = &field.field_type {
            let nested = format!("{name}.");
            for child in fields {
                Self::collect_field_rows(child, &nested, rows);
            }
        }
    }

    /// Formats one resource's state for display.
    #[must_use]
    pub fn format_resource(&self, kind: ResourceKind, data: &ResourceData) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(data).unwrap_or_default(),
            OutputFormat::Text => Self::format_resource_text(kind, data),
        }
    }

    fn format_resource_text(kind: ResourceKind, data: &ResourceData) -> String {
        let Some(id) = &data.id else {
            return format!("{} {kind} not found\n", "✗".red());
        };

        let mut output = String::new();
        let _ = writeln!(output, "\n{} {}", kind.to_string().bold(), id.cyan());

        let rows: Vec<PropertyRow> = data
            .properties
            .iter()
            .flat_map(|(name, value)| Self::property_rows(name, value))
            .collect();

        if rows.is_empty() {
            output.push_str("   No properties.\n");
        } else {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }
        output
    }

    /// Expands string maps one key per row, as `field.key`.
    fn property_rows(name: &str, value: &Value) -> Vec<PropertyRow> {
        match value {
            Value::Object(map) if !map.is_empty() && map.values().all(Value::is_string) => map
                .iter()
                .map(|(key, v)| PropertyRow {
                    name: format!("{name}.{key}"),
                    value: Self::truncate(v.as_str().unwrap_or_default(), MAX_CELL_WIDTH),
                })
                .collect(),
            Value::String(s) => vec![PropertyRow {
                name: name.to_string(),
                value: Self::truncate(s, MAX_CELL_WIDTH),
            }],
            other => vec![PropertyRow {
                name: name.to_string(),
                value: Self::truncate(&other.to_string(), MAX_CELL_WIDTH),
            }],
        }
    }

    /// Formats a configuration validation outcome.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, server: Option<&str>) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.errors.is_empty(),
                    "warnings": result.warnings,
                    "server": server,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid\n", "✓".green());
                for warning in &result.warnings {
                    let _ = writeln!(output, "{} {warning}", "⚠".yellow());
                }
                if let Some(url) = server {
                    let _ = writeln!(output, "{} Connected to {url}", "✓".green());
                }
                output
            }
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "success", "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", "✓".green()),
        }
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "error", "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len - 3).collect();
            format!("{head}...")
        }
    }
}
