#![forbid(unsafe_code)]

//! `acp-conductor`: interactive ACP client binary.
//!
//! Connects to an agent server, runs a prompt loop on the terminal with
//! operator approval for every tool call, and manages stored sessions.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use acp_conductor::approval::TerminalApprover;
use acp_conductor::audit::JsonlAuditWriter;
use acp_conductor::console::Console;
use acp_conductor::orchestrator::{EngineConfig, SessionEngine};
use acp_conductor::persistence::db;
use acp_conductor::persistence::session_repo::SessionRepo;
use acp_conductor::tools::local::LocalToolHost;
use acp_conductor::transport::HttpSseTransport;
use acp_conductor::{AppError, ClientConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "acp-conductor", about = "ACP client with operator-approved tool calls", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured workspace root.
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Override the configured model.
    #[arg(long)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start an interactive session with the agent.
    Chat {
        /// Restore a stored session before the first prompt.
        #[arg(long)]
        resume: Option<String>,
    },
    /// Inspect or remove stored sessions.
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
}

#[derive(Debug, Subcommand)]
enum SessionsAction {
    /// List stored session ids, oldest first.
    List,
    /// Print one stored session as JSON.
    Show {
        /// Session id.
        id: String,
    },
    /// Delete one stored session.
    Delete {
        /// Session id.
        id: String,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = ClientConfig::load_from_path(&args.config)?;
    if let Some(ws) = args.workspace {
        config.set_workspace_root(ws)?;
    }
    if let Some(model) = args.model.filter(|m| !m.trim().is_empty()) {
        config.model = model;
    }
    info!(
        server = config.server_url.as_str(),
        workspace = %config.workspace_root.display(),
        "configuration loaded"
    );

    let db = Arc::new(db::connect(&config.db_path()).await?);
    let repo = SessionRepo::new(db);

    match args.command {
        Command::Chat { resume } => run_chat(config, repo, resume).await,
        Command::Sessions { action } => run_sessions(&repo, action).await,
    }
}

async fn run_sessions(repo: &SessionRepo, action: SessionsAction) -> Result<()> {
    match action {
        SessionsAction::List => {
            for id in repo.list().await? {
                println!("{id}");
            }
        }
        SessionsAction::Show { id } => {
            let session = repo
                .load(&id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("session {id}")))?;
            let rendered = serde_json::to_string_pretty(&session)
                .map_err(|err| AppError::Db(format!("cannot render session: {err}")))?;
            println!("{rendered}");
        }
        SessionsAction::Delete { id } => {
            if repo.delete(&id).await? {
                println!("deleted {id}");
            } else {
                println!("no stored session {id}");
            }
        }
    }
    Ok(())
}

async fn run_chat(config: ClientConfig, repo: SessionRepo, resume: Option<String>) -> Result<()> {
    let console = Console::stdin();
    let audit = Arc::new(JsonlAuditWriter::new(config.audit_dir())?);
    let engine = SessionEngine::new(
        EngineConfig::from(&config),
        Arc::new(HttpSseTransport::from_config(&config)),
        Arc::new(LocalToolHost::new(config.workspace_root.clone())),
        Arc::new(TerminalApprover::new(console.clone())),
    )
    .with_store(repo)
    .with_audit(audit);

    let mut updates = engine.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            if let Some(text) = update.message_text() {
                let mut out = std::io::stdout().lock();
                if write!(out, "{text}").and_then(|()| out.flush()).is_err() {
                    break;
                }
            }
        }
    });

    let outcome = chat(&engine, &console, resume).await;
    engine.shutdown().await;
    drop(engine);
    if let Err(err) = printer.await {
        warn!(%err, "update printer ended abnormally");
    }
    info!("acp-conductor shut down");
    outcome
}

async fn chat(engine: &SessionEngine, console: &Console, resume: Option<String>) -> Result<()> {
    engine.start_session().await?;
    if let Some(id) = resume {
        let session = engine.resume_session(&id).await?;
        eprintln!(
            "resumed {} ({} history entries; the agent does not see them)",
            session.id,
            session.history.len()
        );
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        eprint!("> ");
        let line = tokio::select! {
            () = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            () = engine.closed() => {
                warn!("connection closed by agent");
                break;
            }
            line = console.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("stdin closed");
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        tokio::select! {
            () = &mut shutdown => {
                info!("shutdown signal received during turn");
                break;
            }
            result = engine.send_prompt(text) => match result {
                Ok(result) => {
                    println!();
                    debug!(%result, "turn finished");
                }
                Err(err) => {
                    error!(%err, "prompt failed");
                    if !engine.is_connected() {
                        break;
                    }
                }
            },
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
