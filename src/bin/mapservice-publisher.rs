//! mapservice-publisher CLI
//!
//! Publish and unpublish map services from map document templates

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use mapservice_publisher::core::config_loader::{ConfigLoadOptions, ConfigLoader};
use mapservice_publisher::core::{
    DatastoreConfig, PublicationRequest, PublishParameters, PublisherConfig, ServerConfig,
    WorkflowError,
};
use mapservice_publisher::managers::ScriptManagerFactory;
use mapservice_publisher::orchestration::PublicationWorkflow;
use mapservice_publisher::security::credentials;
use mapservice_publisher::validation::RequestValidator;
use secrecy::ExposeSecret;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// Map service publication tool
#[derive(Parser)]
#[command(name = "mapservice-publisher")]
#[command(version)]
#[command(about = "Publish map documents as GIS map services", long_about = None)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a map document template as a service
    Publish {
        #[command(flatten)]
        target: TargetArgs,

        /// Service name (sanitized before use)
        #[arg(short, long)]
        name: Option<String>,

        /// Server connection file (selects connection-file publishing)
        #[arg(long, requires = "script_file")]
        connection_file: Option<String>,

        /// Publishing script used with --connection-file
        #[arg(long)]
        script_file: Option<String>,

        /// Print the structured result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a published service
    Unpublish {
        #[command(flatten)]
        target: TargetArgs,

        /// Name of the service to remove
        #[arg(long)]
        service_id: Option<String>,
    },

    /// Validate configuration and request without contacting the server
    Check {
        #[command(flatten)]
        target: TargetArgs,

        /// Service name to check
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Encode or decode basic-auth credentials
    Credentials {
        #[command(subcommand)]
        action: CredentialAction,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Map document template (.mxd)
    #[arg(short, long, default_value = "")]
    template: String,

    /// Directory holding .mapservice-publish.yaml (defaults to current directory)
    #[arg(short, long, value_name = "PROJECT_PATH")]
    project: Option<PathBuf>,

    /// GIS server endpoint
    #[arg(short, long)]
    server: Option<String>,

    /// Directory for working documents
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Datastore connection descriptor
    #[arg(long)]
    connection: Option<String>,

    /// Dataset identifier
    #[arg(long)]
    dataset: Option<String>,

    /// Datastore is a versioned enterprise store
    #[arg(long)]
    enterprise: bool,
}

#[derive(Subcommand)]
enum CredentialAction {
    /// Print base64 of username:password
    Encode {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },

    /// Decode a base64 credential blob
    Decode {
        value: String,

        /// Print the password in clear text
        #[arg(long)]
        show_password: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Publish {
            target,
            name,
            connection_file,
            script_file,
            json,
        } => publish_command(target, name, connection_file, script_file, json).await,
        Commands::Unpublish { target, service_id } => unpublish_command(target, service_id).await,
        Commands::Check { target, name } => check_command(target, name).await,
        Commands::Credentials { action } => Ok(credentials_command(action)),
    }
}

/// Overlay built from command-line flags; highest configuration priority
fn cli_overlay(target: &TargetArgs) -> PublisherConfig {
    PublisherConfig {
        capacity: None,
        security: None,
        server: Some(ServerConfig {
            endpoint: target.server.clone(),
            output_directory: target.output_dir.clone(),
        }),
        datastore: Some(DatastoreConfig {
            connection: target.connection.clone(),
            dataset: target.dataset.clone(),
            enterprise: target.enterprise.then_some(true),
        }),
        ..Default::default()
    }
}

async fn load_config(target: &TargetArgs) -> Result<(PathBuf, PublisherConfig)> {
    let project_path = target.project.clone().unwrap_or_else(|| PathBuf::from("."));

    let config = ConfigLoader::load(ConfigLoadOptions {
        project_path: project_path.clone(),
        cli_args: Some(cli_overlay(target)),
        env: std::env::vars().collect(),
    })
    .await?;

    Ok((project_path, config))
}

fn build_request(target: &TargetArgs, config: &PublisherConfig) -> PublicationRequest {
    let server = config.server.clone().unwrap_or_default();
    let datastore = config.datastore.clone().unwrap_or_default();

    PublicationRequest::new(target.template.as_str(), server.endpoint.unwrap_or_default())
        .with_output_directory(server.output_directory.unwrap_or_default())
        .with_datastore(
            datastore.connection.unwrap_or_default(),
            datastore.dataset.unwrap_or_default(),
            datastore.enterprise.unwrap_or(false),
        )
}

fn workflow(
    project_path: &Path,
    config: &PublisherConfig,
    request: PublicationRequest,
) -> Result<PublicationWorkflow<ScriptManagerFactory>> {
    let helper = config.helper.clone().unwrap_or_default();
    if helper.script.is_none() {
        eprintln!("⚠️  No helper script configured (helper.script); the document manager will not initialize");
    }

    let factory = ScriptManagerFactory::new(helper, project_path)?;
    let workflow =
        PublicationWorkflow::new(request, factory).with_options(config.workflow_options());

    tracing::debug!(
        service = workflow.request().service_name(),
        options = ?workflow.options(),
        "workflow ready"
    );
    Ok(workflow)
}

/// Print an aborted invocation; exit code 2
fn report_abort(error: &WorkflowError) -> i32 {
    eprintln!("\n❌ [{}] {}", error.code(), error);
    for action in error.suggested_actions() {
        eprintln!("  - {}", action);
    }
    if error.is_recoverable() {
        eprintln!("  Retrying the same invocation may succeed.");
    }
    2
}

async fn publish_command(
    target: TargetArgs,
    name: Option<String>,
    connection_file: Option<String>,
    script_file: Option<String>,
    json: bool,
) -> Result<i32> {
    let (project_path, config) = load_config(&target).await?;

    let mut request = build_request(&target, &config);
    if let Some(name) = &name {
        request = request.with_service_name(name);
    }

    let params = match connection_file {
        Some(connection_file) => {
            PublishParameters::connection_file(connection_file, script_file.unwrap_or_default())
        }
        None => PublishParameters::legacy(config.capacity_settings()),
    };

    let workflow = workflow(&project_path, &config, request)?;

    match workflow.run_publish(params).await {
        Ok(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.render());
            }
            Ok(if result.has_failures() { 1 } else { 0 })
        }
        Err(e) => Ok(report_abort(&e)),
    }
}

async fn unpublish_command(target: TargetArgs, service_id: Option<String>) -> Result<i32> {
    let (project_path, config) = load_config(&target).await?;

    let mut request = build_request(&target, &config);
    if let Some(service_id) = service_id {
        request = request.with_service_id(service_id);
    }

    let workflow = workflow(&project_path, &config, request)?;

    match workflow.run_unpublish().await {
        Ok(outcome) => {
            println!("{}", outcome.text);
            Ok(if outcome.removed { 0 } else { 1 })
        }
        Err(e) => Ok(report_abort(&e)),
    }
}

async fn check_command(target: TargetArgs, name: Option<String>) -> Result<i32> {
    println!("\n🔍 Publication Check\n");

    let (_, config) = load_config(&target).await?;

    let config_result = ConfigLoader::validate(&config);
    println!("{}", ConfigLoader::format_validation_result(&config_result));

    let mut request = build_request(&target, &config);
    if let Some(name) = &name {
        request = request.with_service_name(name);
    }

    let result = RequestValidator::new()
        .validate(&request, name.as_deref())
        .await;

    if result.valid {
        println!("  ✅ Request is valid");
    } else {
        println!("  ❌ Request is invalid");
        for error in &result.errors {
            println!("    - [{}] {}", error.field, error.message);
        }
    }

    if !result.warnings.is_empty() {
        println!("  ⚠️  Warnings:");
        for warning in &result.warnings {
            println!("    - [{}] {}", warning.field, warning.message);
        }
    }

    println!();
    Ok(if result.valid && config_result.valid { 0 } else { 1 })
}

fn credentials_command(action: CredentialAction) -> i32 {
    match action {
        CredentialAction::Encode { username, password } => {
            println!("{}", credentials::encode(&username, &password));
            0
        }
        CredentialAction::Decode {
            value,
            show_password,
        } => {
            let decoded = credentials::decode(&value);
            if decoded.is_empty() {
                eprintln!("⚠️  Value did not decode to username:password");
                return 1;
            }

            let password = if show_password {
                decoded.password.expose_secret().to_string()
            } else {
                credentials::mask_secret(decoded.password.expose_secret())
            };
            println!("username: {}", decoded.username);
            println!("password: {}", password);
            0
        }
    }
}
