//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::resources::ResourceKind;

/// chef-resources - Chef server data bags, environments and search.
#[derive(Parser, Debug)]
#[command(name = "chef-resources")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "CHEF_RESOURCES_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer provider requests on stdin/stdout until input closes.
    Serve,

    /// Show resource schemas.
    Schema {
        /// Only show this kind.
        kind: Option<ResourceKind>,
    },

    /// Read one object from the server.
    Get {
        /// Resource kind.
        kind: ResourceKind,

        /// Resource id (`bag.item` is accepted for data bag items).
        id: String,
    },

    /// Import an existing object, failing if it does not exist.
    Import {
        /// Resource kind.
        kind: ResourceKind,

        /// Import id.
        id: String,
    },

    /// Delete an object from the server.
    Delete {
        /// Resource kind.
        kind: ResourceKind,

        /// Resource id (`bag.item` for data bag items).
        id: String,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Run a search and show the first match.
    Search {
        /// Solr query.
        query: String,

        /// Index to search.
        #[arg(short, long, default_value = "node")]
        index: String,

        /// Partial-search attribute, as `name=path.to.attr`.
        #[arg(short, long = "filter", value_name = "NAME=PATH")]
        filters: Vec<String>,

        /// Fail unless exactly one object matches.
        #[arg(short, long)]
        unique: bool,
    },

    /// Validate the configuration and check the server is reachable.
    Validate {
        /// Skip the server round trip.
        #[arg(long)]
        offline: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_filters() {
        let cli = Cli::try_parse_from([
            "chef-resources",
            "search",
            "role:web",
            "--index",
            "node",
            "-f",
            "ip=network.ipaddress",
            "-f",
            "name=name",
            "--unique",
        ])
        .expect("valid args");

        let Commands::Search {
            query,
            filters,
            unique,
            ..
        } = cli.command
        else {
            panic!("expected search");
        };
        assert_eq!(query, "role:web");
        assert_eq!(filters, vec!["ip=network.ipaddress", "name=name"]);
        assert!(unique);
    }

    #[test]
    fn test_parse_kind_names() {
        let cli = Cli::try_parse_from(["chef-resources", "get", "data-bag-item", "users.alice"])
            .expect("valid args");
        assert!(matches!(
            cli.command,
            Commands::Get {
                kind: ResourceKind::DataBagItem,
                ..
            }
        ));
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["chef-resources", "schema", "-v", "--output", "json"])
            .expect("valid args");
        assert!(cli.verbose);
        assert!(matches!(cli.output, OutputFormat::Json));
    }
}
