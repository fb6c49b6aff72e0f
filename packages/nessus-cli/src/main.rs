//! Nessus CLI - inspect a Nessus scanner from the terminal
//!
//! This binary can:
//! - Check server status and version
//! - List scans, policies, users, folders, scanners, agents and templates
//! - Import `.nessus` scan and policy files

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use nessus_core::config::{generate_example_config, get_config_file_path_string};
use nessus_core::{NessusClient, ResourceKind, ServerConfig, load_config};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "nessus")]
#[command(author = "Nessus Client Team")]
#[command(version)]
#[command(about = "Inspect scans, policies and agents on a Nessus server")]
#[command(long_about = "
Nessus CLI talks to the REST API of a Nessus 6.x scanner.

Quick start:
  1. Point it at a server:  export NESSUS_HOST=nessus.example.com
  2. Provide credentials:   export NESSUS_USERNAME=admin NESSUS_PASSWORD=...
  3. List scans:            nessus scans

Settings can also live in the config file, see: nessus config
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Server host, overrides config file and NESSUS_HOST
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Skip TLS certificate verification
    #[arg(short = 'k', long, global = true)]
    pub insecure: bool,

    /// Login name
    #[arg(short, long, global = true)]
    pub username: Option<String>,

    /// Login password
    #[arg(long, global = true, env = "NESSUS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

/// Collections that can be loaded one at a time
#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Properties,
    Mail,
    Proxy,
    Scanners,
    Agents,
    AgentGroups,
    Policies,
    Scans,
    Folders,
    Templates,
    Users,
    Groups,
    PluginFamilies,
    PluginRules,
}

impl From<KindArg> for ResourceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Properties => ResourceKind::Properties,
            KindArg::Mail => ResourceKind::Mail,
            KindArg::Proxy => ResourceKind::Proxy,
            KindArg::Scanners => ResourceKind::Scanners,
            KindArg::Agents => ResourceKind::Agents,
            KindArg::AgentGroups => ResourceKind::AgentGroups,
            KindArg::Policies => ResourceKind::Policies,
            KindArg::Scans => ResourceKind::Scans,
            KindArg::Folders => ResourceKind::Folders,
            KindArg::Templates => ResourceKind::Templates,
            KindArg::Users => ResourceKind::Users,
            KindArg::Groups => ResourceKind::Groups,
            KindArg::PluginFamilies => ResourceKind::PluginFamilies,
            KindArg::PluginRules => ResourceKind::PluginRules,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show server status and version (no login needed)
    Status,

    /// Check that the configured credentials are accepted
    Login,

    /// List scans
    Scans,

    /// List scan policies
    Policies,

    /// List users
    Users,

    /// List scan folders
    Folders,

    /// List scanners
    Scanners,

    /// List agents of every scanner
    Agents,

    /// List scan templates
    Templates,

    /// Load one collection, or everything, and report what was loaded
    Load {
        /// Collection to load (default: all)
        kind: Option<KindArg>,
    },

    /// Import a .nessus scan file
    ImportScan {
        file: PathBuf,

        /// Folder to import into
        #[arg(long)]
        folder: Option<u64>,

        /// Password protecting the file
        #[arg(long)]
        file_password: Option<String>,
    },

    /// Import a .nessus policy file
    ImportPolicy { file: PathBuf },

    /// Show configuration paths and settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("nessus={},nessus_core={}", log_level, log_level).into()
            }),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = server_config(&cli);

    match &cli.command {
        Commands::Status => cmd_status(&cli, &config).await,
        Commands::Config => cmd_config(&cli, &config),
        _ => run_logged_in(&cli, &config).await,
    }
}

/// Config file and environment, then command-line overrides.
fn server_config(cli: &Cli) -> ServerConfig {
    let mut config = load_config();
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.insecure {
        config.verify = false;
    }
    if let Some(username) = &cli.username {
        config.username = Some(username.clone());
    }
    if let Some(password) = &cli.password {
        config.password = Some(password.clone());
    }
    config
}

async fn run_logged_in(cli: &Cli, config: &ServerConfig) -> Result<()> {
    let Some(credentials) = config.credentials() else {
        bail!("No credentials configured. Set NESSUS_USERNAME and NESSUS_PASSWORD or use --username/--password");
    };

    let mut client = NessusClient::from_config(config);
    client
        .login(credentials)
        .await
        .with_context(|| format!("Login to {} failed", config.base_url()))?;

    let result = run_command(cli, &mut client).await;

    if let Err(e) = client.logout().await {
        tracing::warn!("Logout failed: {}", e);
    }
    result
}

async fn run_command(cli: &Cli, client: &mut NessusClient) -> Result<()> {
    match &cli.command {
        Commands::Login => cmd_login(cli, client),
        Commands::Scans => {
            let scans = client.scans().await?;
            print_list(cli, scans, |s| {
                println!(
                    "  {:>6}  {:<40} {:<10} {}",
                    s.id,
                    s.name,
                    s.status.as_deref().unwrap_or("-"),
                    s.owner()
                        .map(|u| u.username.clone())
                        .or_else(|| s.owner_name.clone())
                        .unwrap_or_else(|| "-".to_string())
                );
            })
        }
        Commands::Policies => {
            let policies = client.policies().await?;
            print_list(cli, policies, |p| {
                let template = p.template().map(|t| t.name.clone());
                println!(
                    "  {:>6}  {:<40} {}",
                    p.id,
                    p.name,
                    template.as_deref().unwrap_or("-")
                );
            })
        }
        Commands::Users => {
            let users = client.users().await?;
            print_list(cli, users, |u| {
                let last = u
                    .last_login_at()
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!("  {:>6}  {:<24} {:>3}  {}", u.id, u.username, u.permissions, last);
            })
        }
        Commands::Folders => {
            let folders = client.folders().await?;
            print_list(cli, folders, |f| {
                println!(
                    "  {:>6}  {:<30} {:<8} unread: {}",
                    f.id, f.name, f.kind, f.unread_count
                );
            })
        }
        Commands::Scanners => {
            let scanners = client.scanners().await?;
            print_list(cli, scanners, |s| {
                println!(
                    "  {:>6}  {:<30} {:<10} {}",
                    s.id,
                    s.name,
                    s.status.as_deref().unwrap_or("-"),
                    s.engine_version.as_deref().unwrap_or("-")
                );
            })
        }
        Commands::Agents => {
            let agents = client.agents().await?;
            print_list(cli, agents, |a| {
                let scanner = a.scanner().map(|s| s.name.clone());
                println!(
                    "  {:>6}  {:<30} {:<15} {}",
                    a.id,
                    a.name,
                    a.ip.as_deref().unwrap_or("-"),
                    scanner.as_deref().unwrap_or("-")
                );
            })
        }
        Commands::Templates => {
            let templates = client.templates().await?;
            print_list(cli, templates, |t| {
                println!(
                    "  {:<36}  {:<24} {}",
                    t.uuid,
                    t.name,
                    t.title.as_deref().unwrap_or("")
                );
            })
        }
        Commands::Load { kind } => cmd_load(cli, client, *kind).await,
        Commands::ImportScan {
            file,
            folder,
            file_password,
        } => {
            let imported = client
                .import_scan(file, *folder, file_password.as_deref())
                .await
                .with_context(|| format!("Importing {} failed", file.display()))?;
            print_import(cli, file, imported)
        }
        Commands::ImportPolicy { file } => {
            let imported = client
                .import_policy(file)
                .await
                .with_context(|| format!("Importing {} failed", file.display()))?;
            print_import(cli, file, imported)
        }
        Commands::Status | Commands::Config => Ok(()),
    }
}

fn print_list<T: Serialize>(cli: &Cli, items: &[Arc<T>], row: impl Fn(&T)) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            if items.is_empty() {
                println!("Nothing found.");
            }
            for item in items {
                row(&**item);
            }
        }
        OutputFormat::Json => {
            let plain: Vec<&T> = items.iter().map(|i| &**i).collect();
            println!("{}", serde_json::to_string_pretty(&plain)?);
        }
    }
    Ok(())
}

fn print_import(cli: &Cli, file: &std::path::Path, imported: Option<serde_json::Value>) -> Result<()> {
    match cli.format {
        OutputFormat::Text => println!("Imported {}", file.display()),
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "status": "imported",
                    "file": file.display().to_string(),
                    "result": imported,
                })
            );
        }
    }
    Ok(())
}

async fn cmd_status(cli: &Cli, config: &ServerConfig) -> Result<()> {
    let mut client = NessusClient::from_config(config);
    let status = client
        .status()
        .await
        .with_context(|| format!("Can't reach {}", config.base_url()))?;
    let version = client
        .session_mut()
        .probe_server_version()
        .await?
        .to_string();

    match cli.format {
        OutputFormat::Text => {
            println!("Server:  {}", config.base_url());
            println!("Status:  {}", status);
            println!("Version: {}", version);
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "server": config.base_url(),
                    "status": status,
                    "server_version": version,
                })
            );
        }
    }

    Ok(())
}

fn cmd_login(cli: &Cli, client: &NessusClient) -> Result<()> {
    let session = client.session();
    let version = session.server_version().map(|v| v.to_string());

    match cli.format {
        OutputFormat::Text => {
            println!(
                "Logged in as {} (server version {})",
                session.username().unwrap_or("-"),
                version.as_deref().unwrap_or("unknown")
            );
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "status": "authenticated",
                    "username": session.username(),
                    "server_version": version,
                })
            );
        }
    }

    Ok(())
}

async fn cmd_load(cli: &Cli, client: &mut NessusClient, kind: Option<KindArg>) -> Result<()> {
    if let Some(kind) = kind {
        let kind = ResourceKind::from(kind);
        let count = client.load(kind).await?;
        match cli.format {
            OutputFormat::Text => println!("Loaded {} {}", count, kind),
            OutputFormat::Json => {
                let mut loaded = serde_json::Map::new();
                loaded.insert(kind.as_str().to_string(), count.into());
                println!("{}", serde_json::Value::Object(loaded));
            }
        }
        return Ok(());
    }

    // Report every state even when the bulk load stops part way
    let outcome = client.load_all().await;
    let registry = client.registry();

    match cli.format {
        OutputFormat::Text => {
            for kind in ResourceKind::LOAD_ALL_ORDER {
                println!("  {:<16} {:?}", kind.as_str(), registry.state(kind));
            }
        }
        OutputFormat::Json => {
            let states: serde_json::Map<String, serde_json::Value> = ResourceKind::LOAD_ALL_ORDER
                .iter()
                .map(|k| {
                    (
                        k.as_str().to_string(),
                        format!("{:?}", registry.state(*k)).to_lowercase().into(),
                    )
                })
                .collect();
            println!("{}", serde_json::Value::Object(states));
        }
    }

    outcome.context("Loading stopped early")
}

fn cmd_config(cli: &Cli, config: &ServerConfig) -> Result<()> {
    let config_path = get_config_file_path_string();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Config file:  {}", config_path);
            println!("Server:       {} (from {})", config.base_url(), config.source);
            println!("Verify TLS:   {}", config.verify);
            println!(
                "Username:     {}",
                config.username.as_deref().unwrap_or("-")
            );
            println!(
                "Password:     {}",
                if config.password.is_some() { "set" } else { "not set" }
            );
            println!();
            println!("Environment variables:");
            println!("  NESSUS_HOST, NESSUS_PORT   - Server address");
            println!("  NESSUS_VERIFY_TLS          - Set to false for self-signed certificates");
            println!("  NESSUS_USERNAME            - Login name");
            println!("  NESSUS_PASSWORD            - Login password");
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", generate_example_config());
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "config_file": config_path,
                    "server": config.base_url(),
                    "source": config.source.to_string(),
                    "verify": config.verify,
                    "username": config.username,
                    "password_set": config.password.is_some(),
                })
            );
        }
    }

    Ok(())
}
