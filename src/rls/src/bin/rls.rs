//! # RLS operator CLI
//!
//! Runs the decision engine against a JSON store snapshot.
//!
//! ## Commands
//!
//! - `rls evaluate` - Decide one operation for a registered session
//! - `rls stats` - Print organization statistics
//! - `rls generate` - Generate a policy from an access-level template
//!
//! ## Configuration
//!
//! - `RLS_CONFIG` - Engine configuration file (TOML)
//! - `RLS_STORE_TIMEOUT_MS` - Store fetch deadline, 0 disables
//! - `RLS_TOP_N` - Length of top policy/rule rankings
//! - `RUST_LOG` - Log level (default: info)

use anyhow::{anyhow, Context as _, Result};
use clap::{Parser, Subcommand};
use cretoai_rls::{
    AccessLevel, EngineConfig, InMemoryStore, Operation, OperationType, PolicyRequirements,
    RlsEngine, StoreSnapshot, SystemClock,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Row-level security engine CLI
#[derive(Parser)]
#[command(name = "rls")]
#[command(about = "Multi-tenant row-level security decisions over a store snapshot")]
#[command(version)]
struct Cli {
    /// Store snapshot (JSON)
    #[arg(short, long, env = "RLS_SNAPSHOT")]
    snapshot: PathBuf,

    /// Engine configuration file (TOML)
    #[arg(short, long, env = "RLS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate one operation for a registered session
    Evaluate {
        /// Session whose context is evaluated
        #[arg(long)]
        session: String,

        /// SELECT, INSERT, UPDATE or DELETE
        #[arg(long)]
        operation: OperationType,

        /// Target table
        #[arg(long)]
        table: String,

        /// Target record
        #[arg(long)]
        record_id: Option<String>,

        /// Append the decision to the audit trail and save the snapshot
        #[arg(long)]
        audit: bool,
    },

    /// Print statistics for an organization
    Stats {
        #[arg(long)]
        organization: String,
    },

    /// Generate a policy from a template and save the snapshot
    Generate {
        #[arg(long)]
        organization: String,

        #[arg(long)]
        table: String,

        /// public, organization, user or admin
        #[arg(long)]
        level: AccessLevel,

        /// Comma-separated operation list
        #[arg(long, value_delimiter = ',', required = true)]
        operations: Vec<OperationType>,

        /// Comma-separated role list
        #[arg(long, value_delimiter = ',')]
        roles: Vec<String>,

        /// Extra predicate ANDed onto the template
        #[arg(long)]
        conditions: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => EngineConfig::default(),
    }
    .with_env_overrides()?;

    let store = Arc::new(load_snapshot(&cli.snapshot)?);
    let engine = RlsEngine::with_config(store.clone(), Arc::new(SystemClock), config);

    match cli.command {
        Command::Evaluate {
            session,
            operation,
            table,
            record_id,
            audit,
        } => {
            let context = engine
                .get_context(&session)
                .await?
                .ok_or_else(|| anyhow!("No context registered for session {}", session))?;

            let mut op = Operation::new(operation, table);
            if let Some(record_id) = record_id {
                op = op.with_record(record_id);
            }

            let decision = engine.evaluate_access(&context, &op).await?;
            println!("{}", serde_json::to_string_pretty(&decision)?);

            if audit {
                let entry = engine.record_decision(&context, &op, &decision, None).await?;
                info!("Recorded audit entry {}", entry.id);
                save_snapshot(&cli.snapshot, &store).await?;
            }
        }
        Command::Stats { organization } => {
            let stats = engine.get_stats(&organization).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Generate {
            organization,
            table,
            level,
            operations,
            roles,
            conditions,
        } => {
            let mut requirements = PolicyRequirements::new(level, operations).with_roles(roles);
            requirements.additional_conditions = conditions;

            let policy = engine
                .generate_policy(&organization, &table, &requirements)
                .await?;
            println!("{}", serde_json::to_string_pretty(&policy)?);

            save_snapshot(&cli.snapshot, &store).await?;
        }
    }

    Ok(())
}

fn load_snapshot(path: &Path) -> Result<InMemoryStore> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {:?}", path))?;
    let snapshot: StoreSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse snapshot {:?}", path))?;

    info!(
        "Loaded snapshot: {} policies, {} rules, {} audit entries",
        snapshot.policies.len(),
        snapshot.rules.len(),
        snapshot.audit_log.len()
    );

    Ok(InMemoryStore::from_snapshot(snapshot))
}

/// Replace the snapshot atomically: write a sibling temp file, then rename it over `path`
async fn save_snapshot(path: &Path, store: &InMemoryStore) -> Result<()> {
    let snapshot = store.snapshot().await;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {:?}", dir))?;
    serde_json::to_writer_pretty(&mut file, &snapshot)?;
    file.as_file()
        .sync_all()
        .with_context(|| format!("Failed to flush snapshot for {:?}", path))?;
    file.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write snapshot {:?}", path))?;

    info!("Saved snapshot to {:?}", path);
    Ok(())
}
