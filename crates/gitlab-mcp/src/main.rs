//! GitLab MCP server entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use gitlab_mcp::api::{self, ApiState};
use gitlab_mcp::config;
use gitlab_mcp::gitlab::GitLabClient;
use gitlab_mcp::tools::{ToolContext, ToolProfile, ToolRegistry};
use gitlab_mcp::types::InitializeResult;
use gitlab_mcp::{HttpTransport, ProtocolHandler, StdioTransport};
use gitlab_vault::{CredentialVault, FileStore};

#[derive(Parser)]
#[command(
    name = "gitlab-mcp",
    about = "MCP server exposing GitLab actions with per-chat encrypted credentials",
    version
)]
struct Cli {
    /// Path to the JSON vault file. Also reads GITLAB_MCP_VAULT.
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    /// Keep credentials in memory only (lost on exit).
    #[arg(long, global = true)]
    in_memory: bool,

    /// Tool catalogue to expose. Also reads TOOL_PROFILE.
    #[arg(long, global = true, value_enum)]
    profile: Option<ToolProfile>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server over stdio (default).
    Serve,

    /// Start MCP server over HTTP.
    ServeHttp {
        /// Listen address (host:port). Defaults to 127.0.0.1:3000, or
        /// 0.0.0.0:$PORT when PORT is set.
        #[arg(long)]
        addr: Option<String>,

        /// Bearer token required on /mcp. Also reads MCP_TOKEN.
        #[arg(long)]
        token: Option<String>,

        /// Key for the /api admin routes. Also reads API_KEY.
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Print server identity and tool names as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   gitlab-mcp completions bash > ~/.local/share/bash-completion/completions/gitlab-mcp
    ///   gitlab-mcp completions zsh > ~/.zfunc/_gitlab-mcp
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

async fn open_vault(cli: &Cli) -> anyhow::Result<CredentialVault> {
    let master_key = config::master_key()?;
    if cli.in_memory {
        tracing::warn!("Using in-memory vault; credentials are lost on exit");
        return Ok(CredentialVault::in_memory(master_key));
    }

    let path = config::resolve_vault_path(cli.vault.as_deref());
    let store = FileStore::open(&path)
        .await
        .with_context(|| format!("opening vault {}", path.display()))?;
    tracing::info!("Vault: {}", path.display());
    Ok(CredentialVault::new(master_key, Arc::new(store)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let profile = config::profile(cli.profile)?;

    match cli.command.take().unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let vault = open_vault(&cli).await?;
            let context = ToolContext::new(vault, GitLabClient::new()?);
            let handler = ProtocolHandler::new(Arc::new(ToolRegistry::build(profile)), context);
            StdioTransport::new(handler).run().await?;
        }

        Commands::ServeHttp {
            addr,
            token,
            api_key,
        } => {
            let addr = config::listen_addr(addr.as_deref())?;
            let token = config::bearer_token(token);
            let api_key = config::api_key(api_key)?;

            let vault = open_vault(&cli).await?;
            let gitlab = GitLabClient::new()?;
            let context = ToolContext::new(vault.clone(), gitlab.clone());
            let handler = ProtocolHandler::new(Arc::new(ToolRegistry::build(profile)), context);

            if token.is_some() {
                tracing::info!("Auth: bearer token required on /mcp");
            }
            let mut transport = HttpTransport::new(handler).with_token(token);
            match api_key {
                Some(key) => {
                    tracing::info!("Admin API enabled under /api");
                    transport = transport.with_admin(api::router(ApiState::new(key, vault, gitlab)));
                }
                None => tracing::info!("Admin API disabled (no API_KEY)"),
            }

            transport.run(addr).await?;
        }

        Commands::Info => {
            let capabilities = InitializeResult::default_result();
            let registry = ToolRegistry::build(profile);
            let info = serde_json::json!({
                "server": capabilities.server_info,
                "protocol_version": capabilities.protocol_version,
                "capabilities": capabilities.capabilities,
                "profile": profile.as_str(),
                "tools": registry.names(),
                "tool_count": registry.len(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "gitlab-mcp", &mut std::io::stdout());
        }
    }

    Ok(())
}
