use anyhow::{Context, Result};
use ciamctl::arm::location::LOCATIONS;
use ciamctl::arm::{ArmError, NewTenant, ResourceIdentity, Tags, Tenant, TenantClient};
use ciamctl::config::Config;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Provision Azure external identity (CIAM) directories
#[derive(Parser, Debug)]
#[command(name = "ciamctl", version, about, long_about = None)]
struct Args {
    /// ARM endpoint (defaults to the public cloud)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// ARM API version for ciamDirectories
    #[arg(long, global = true)]
    api_version: Option<String>,

    /// Subscription ID owning the resource group
    #[arg(short, long, global = true)]
    subscription: Option<String>,

    /// Resource group holding the directory
    #[arg(short = 'g', long, global = true)]
    resource_group: Option<String>,

    /// Bearer token for the ARM endpoint
    #[arg(long, env = "ARM_ACCESS_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Give up polling a create after this many seconds
    #[arg(long, global = true)]
    poll_timeout: Option<u64>,

    /// Give up polling a create after this many status requests
    #[arg(long, global = true)]
    max_poll_attempts: Option<u32>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a directory and wait until it is provisioned
    Create {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        display_name: String,
        /// One of: United States, Europe, Asia Pacific, Australia
        #[arg(long)]
        location: String,
        #[arg(long, default_value = "Base")]
        sku: String,
        /// Tag as key=value, repeatable
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },
    /// Show the current state of a directory
    Show {
        #[arg(long)]
        domain: String,
    },
    /// Replace the tags of a directory
    UpdateTags {
        #[arg(long)]
        domain: String,
        /// Tag as key=value, repeatable; none clears all tags
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },
    /// Delete a directory
    Delete {
        #[arg(long)]
        domain: String,
    },
    /// List supported locations
    Locations,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> Option<&'static str> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some("error"),
            LogLevel::Warn => Some("warn"),
            LogLevel::Info => Some("info"),
            LogLevel::Debug => Some("debug"),
            LogLevel::Trace => Some("trace"),
        }
    }
}

fn parse_tag(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // RUST_LOG wins over --log-level
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(level.as_filter()?),
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {log_path:?}: {e}");
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("ciamctl started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("ciamctl").join("ciamctl.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".ciamctl").join("ciamctl.log");
    }
    PathBuf::from("ciamctl.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if let Command::Locations = args.command {
        for (name, code) in LOCATIONS {
            println!("{name}\t{code}");
        }
        return Ok(());
    }

    let mut config = Config::load();
    let arm = config.arm_config(args.endpoint.as_deref(), args.api_version.as_deref())?;
    let poll = config.poll_config(args.poll_timeout, args.max_poll_attempts);
    let subscription = config
        .effective_subscription(args.subscription.as_deref())
        .context("No subscription configured. Set ARM_SUBSCRIPTION_ID or use --subscription")?;
    let resource_group = config
        .effective_resource_group(args.resource_group.as_deref())
        .context("No resource group configured. Use --resource-group")?;

    tracing::info!(
        "Using subscription: {}, resource group: {}, endpoint: {}",
        subscription,
        resource_group,
        arm.endpoint
    );

    let client = TenantClient::connect(arm, poll, args.token.clone())?;

    // Ctrl-C cancels the in-flight call
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, canceling");
                cancel.cancel();
            }
        }
    });

    match run(&client, &subscription, &resource_group, args.command, &cancel).await {
        Ok(tenant) => {
            if let Some(tenant) = tenant {
                println!("{}", serde_json::to_string_pretty(&tenant)?);
            }
            if let Err(e) = config.set_scope(&subscription, &resource_group) {
                tracing::warn!("Failed to save config: {}", e);
            }
            Ok(())
        }
        Err(err) => {
            if let Some(hint) = err.suggestion() {
                eprintln!("hint: {hint}");
            }
            if let Some(body) = err.body() {
                tracing::debug!("Response body: {}", ciamctl::arm::http::sanitize_for_log(body));
            }
            Err(err.into())
        }
    }
}

async fn run(
    client: &TenantClient,
    subscription: &str,
    resource_group: &str,
    command: Command,
    cancel: &CancellationToken,
) -> Result<Option<Tenant>, ArmError> {
    match command {
        Command::Create {
            domain,
            display_name,
            location,
            sku,
            tags,
        } => {
            let identity = ResourceIdentity::new(subscription, resource_group, &domain)?;
            let desired = NewTenant::new(&location, &sku, &display_name).with_tags(tags.into_iter().collect());
            client.create(&identity, &desired, cancel).await.map(Some)
        }
        Command::Show { domain } => {
            let identity = ResourceIdentity::new(subscription, resource_group, &domain)?;
            client.read(&identity, cancel).await.map(Some)
        }
        Command::UpdateTags { domain, tags } => {
            let identity = ResourceIdentity::new(subscription, resource_group, &domain)?;
            let tags: Tags = tags.into_iter().collect();
            client.update(&identity, &tags, cancel).await.map(Some)
        }
        Command::Delete { domain } => {
            let identity = ResourceIdentity::new(subscription, resource_group, &domain)?;
            client.delete(&identity, cancel).await?;
            eprintln!("Deleted {domain}");
            Ok(None)
        }
        Command::Locations => Ok(None),
    }
}
