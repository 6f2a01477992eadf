//! chef-resources CLI entrypoint.
//!
//! Runs the provider server for a host orchestration runtime, or inspects
//! Chef objects by hand.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chef_resources::chef::{ChefApi, ChefClient};
use chef_resources::cli::{Cli, Commands, OutputFormatter};
use chef_resources::config::{
    ConfigParser, ConfigValidator, ConnectionSettings, ValidationResult, find_config_file,
};
use chef_resources::error::{ChefResourcesError, ResourceError, Result};
use chef_resources::provider::{Provider, ProviderRequest, ProviderResponse};
use chef_resources::resources::{ResourceData, ResourceKind, all_schemas, locate, resource_for};

use serde_json::{Map, Value, json};
use tokio::io::BufReader;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose, cli.log_json);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    match runtime.block_on(run(cli, &formatter)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", formatter.error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// Logs always go to stderr; stdout carries command output or, when serving,
/// the provider protocol.
fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<()> {
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Serve => cmd_serve(config).await,
        Commands::Schema { kind } => cmd_schema(kind, formatter),
        Commands::Get { kind, id } => cmd_get(config, kind, &id, formatter).await,
        Commands::Import { kind, id } => cmd_import(config, kind, id, formatter).await,
        Commands::Delete { kind, id, yes } => cmd_delete(config, kind, &id, yes, formatter).await,
        Commands::Search {
            query,
            index,
            filters,
            unique,
        } => cmd_search(config, query, index, &filters, unique, formatter).await,
        Commands::Validate { offline } => cmd_validate(config, offline, formatter).await,
    }
}

/// Serve provider requests on stdin/stdout.
async fn cmd_serve(config_path: Option<&Path>) -> Result<()> {
    let (settings, _) = load_settings(config_path)?;
    let provider = Provider::new(settings.connect()?);

    info!("Serving provider requests for {}", settings.url);
    let handled = provider
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;
    debug!("Served {handled} requests");
    Ok(())
}

/// Show resource schemas.
fn cmd_schema(kind: Option<ResourceKind>, formatter: &OutputFormatter) -> Result<()> {
    let schemas = match kind {
        Some(kind) => vec![resource_for(kind).schema()],
        None => all_schemas(),
    };
    emit(&formatter.format_schemas(&schemas))
}

/// Read one object.
async fn cmd_get(
    config_path: Option<&Path>,
    kind: ResourceKind,
    id: &str,
    formatter: &OutputFormatter,
) -> Result<()> {
    let provider = connect(config_path)?;
    let located = locate(kind, id)?;

    let data = run_request(
        &provider,
        ProviderRequest::Read {
            resource: kind,
            id: located.id,
            properties: located.properties,
        },
    )
    .await?;
    emit(&formatter.format_resource(kind, &data))
}

/// Import an existing object.
async fn cmd_import(
    config_path: Option<&Path>,
    kind: ResourceKind,
    id: String,
    formatter: &OutputFormatter,
) -> Result<()> {
    let provider = connect(config_path)?;
    let data = run_request(&provider, ProviderRequest::Import { resource: kind, id }).await?;
    emit(&formatter.format_resource(kind, &data))
}

/// Delete an object.
async fn cmd_delete(
    config_path: Option<&Path>,
    kind: ResourceKind,
    id: &str,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let located = locate(kind, id)?;
    let provider = connect(config_path)?;

    // Confirm
    if !auto_approve {
        eprint!("Delete {kind} '{id}' from the Chef server? Type 'yes' to confirm: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != "yes" {
            eprintln!("Deletion cancelled.");
            return Ok(());
        }
    }

    run_request(
        &provider,
        ProviderRequest::Delete {
            resource: kind,
            id: located.id.unwrap_or_default(),
            properties: located.properties,
        },
    )
    .await?;
    emit(&formatter.success(&format!("Deleted {kind} '{id}'")))
}

/// Run a search.
async fn cmd_search(
    config_path: Option<&Path>,
    query: String,
    index: String,
    filters: &[String],
    unique: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let filter = filters
        .iter()
        .map(|f| parse_filter(f))
        .collect::<Result<Vec<Value>>>()?;

    let mut properties = Map::new();
    properties.insert(String::from("query"), Value::String(query));
    properties.insert(String::from("index"), Value::String(index));
    properties.insert(String::from("unique"), Value::Bool(unique));
    if !filter.is_empty() {
        properties.insert(String::from("filter"), Value::Array(filter));
    }

    let provider = connect(config_path)?;
    let data = run_request(
        &provider,
        ProviderRequest::Read {
            resource: ResourceKind::Search,
            id: None,
            properties,
        },
    )
    .await?;
    emit(&formatter.format_resource(ResourceKind::Search, &data))
}

/// Validate configuration and, unless offline, probe the server.
async fn cmd_validate(
    config_path: Option<&Path>,
    offline: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (settings, result) = load_settings(config_path)?;
    let signer = settings.signer()?;
    debug!("Loaded key for client {}", signer.client_name());

    if offline {
        return emit(&formatter.format_validation(&result, None));
    }

    let client = settings.connect()?;
    let bags = client.list_data_bags().await?;
    debug!("Server lists {} data bags", bags.len());
    emit(&formatter.format_validation(&result, Some(settings.url.as_str())))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Writes command output to stdout.
fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", output.trim_end())?;
    Ok(())
}

/// Parses a `name=path.to.attr` search filter into a filter block.
fn parse_filter(raw: &str) -> Result<Value> {
    let (name, path) = raw
        .split_once('=')
        .filter(|(name, path)| !name.is_empty() && !path.is_empty())
        .ok_or_else(|| ResourceError::InvalidField {
            kind: ResourceKind::Search.to_string(),
            field: String::from("filter"),
            expected: format!("NAME=PATH, got '{raw}'"),
        })?;
    let segments: Vec<&str> = path.split('.').collect();
    Ok(json!({ "name": name, "value": segments }))
}

/// Runs one request through the provider and returns the resulting state.
async fn run_request(
    provider: &Provider<ChefClient>,
    request: ProviderRequest,
) -> Result<ResourceData> {
    match provider.dispatch(request).await? {
        ProviderResponse::Ok { id, properties } => Ok(ResourceData { id, properties }),
        ProviderResponse::Error { message } => Err(ChefResourcesError::internal(message)),
        ProviderResponse::Schema { .. } => Err(ChefResourcesError::internal(
            "unexpected schema response",
        )),
    }
}

/// Loads, validates and resolves the connection settings.
fn load_settings(config_path: Option<&Path>) -> Result<(ConnectionSettings, ValidationResult)> {
    let config_file = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(std::env::current_dir()?),
    };

    let base = config_file
        .as_deref()
        .and_then(Path::parent)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let parser = ConfigParser::new().with_base_path(base);
    parser.load_dotenv()?;

    let config = parser.load_with_env(config_file.as_deref())?;
    let result = ConfigValidator::new().validate(&config.server)?;
    let settings = ConfigParser::resolve(&config)?;
    debug!("Using Chef server {} as {}", settings.url, settings.client_name);

    Ok((settings, result))
}

/// Builds a provider connected to the configured server.
fn connect(config_path: Option<&Path>) -> Result<Provider<ChefClient>> {
    let (settings, _) = load_settings(config_path)?;
    Ok(Provider::new(settings.connect()?))
}
