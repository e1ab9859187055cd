//! Session management commands
//!
//! `plugsmith sessions list` : persisted sessions, newest first
//! `plugsmith sessions show <id>` : one session with its ledgers
//! `plugsmith sessions cleanup` : remove expired session files

use super::SessionCommands;
use crate::config::AppConfig;
use anyhow::{anyhow, Context, Result};
use plugsmith_core::{format_error_for_cli, ContextStore, SessionContext};
use std::time::Duration;
use uuid::Uuid;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Run a sessions subcommand.
pub fn run(cmd: SessionCommands, config: &AppConfig) -> Result<()> {
    let store = ContextStore::new(&config.context).map_err(|e| anyhow!(format_error_for_cli(&e)))?;

    match cmd {
        SessionCommands::List => list(&store),
        SessionCommands::Show { id } => show(&store, &id),
        SessionCommands::Cleanup { days } => {
            cleanup(&store, days.unwrap_or(config.context.retention_days))
        }
    }
}

fn list(store: &ContextStore) -> Result<()> {
    let sessions = store.list().context("Failed to list sessions")?;
    if sessions.is_empty() {
        println!("No sessions in {}", store.context_dir().display());
        return Ok(());
    }

    println!("{:<38}{:<28}{:<16}{:>9}", "SESSION", "PLUGIN", "PHASE", "PROGRESS");
    for s in sessions {
        println!(
            "{:<38}{:<28}{:<16}{:>8.1}%",
            s.session_id,
            s.plugin_name.as_deref().unwrap_or("-"),
            s.current_phase.as_str(),
            s.progress,
        );
    }
    Ok(())
}

fn show(store: &ContextStore, id: &str) -> Result<()> {
    let session_id = Uuid::parse_str(id.trim())
        .with_context(|| format!("'{}' is not a valid session id", id))?;
    let ctx = store
        .load(session_id)
        .map_err(|e| anyhow!(format_error_for_cli(&e)))?
        .with_context(|| format!("Session not found: {}", session_id))?;

    print_session(&ctx);
    Ok(())
}

fn print_session(ctx: &SessionContext) {
    println!("{}", ctx.context_instructions());
    println!();
    println!("Started:  {}", ctx.start_time.to_rfc3339());
    println!("Agent:    {}", ctx.current_agent.as_deref().unwrap_or("-"));
    println!("Files:    {}", ctx.generated_files.len());

    if !ctx.errors().is_empty() {
        println!("\nErrors ({}):", ctx.errors().len());
        for e in ctx.errors() {
            println!(
                "  [{}] {} ({}, {})",
                e.error_type,
                e.message,
                e.agent.as_deref().unwrap_or("unknown"),
                e.phase.as_str()
            );
        }
    }

    if !ctx.messages().is_empty() {
        println!("\nMessages ({}):", ctx.messages().len());
        for m in ctx.messages() {
            println!("  {} {}: {}", m.timestamp.format("%H:%M:%S"), m.agent, m.message);
        }
    }
}

fn cleanup(store: &ContextStore, days: u64) -> Result<()> {
    let removed = store
        .cleanup(Duration::from_secs(days.saturating_mul(SECS_PER_DAY)))
        .context("Failed to clean up sessions")?;
    println!("Removed {} session(s) older than {} day(s)", removed, days);
    Ok(())
}
