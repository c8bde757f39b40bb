//! Session commands
//!
//! `mint` prints a token on stdout and `join` prints the joined identity, so
//! the two compose in a pipeline. Session log lines go to stderr.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use causeway_core::{Context, ContextConfig, SessionLogPlugin};
use clap::Args;
use tracing::debug;

use crate::sink::ConsoleSink;

/// Arguments for the mint command
#[derive(Args)]
pub struct MintArgs {
    /// Baggage property as key=value; may be repeated
    #[clap(long, value_parser = parse_baggage)]
    pub baggage: Vec<(String, String)>,

    /// Deadline in seconds from now
    #[clap(long)]
    pub deadline_secs: Option<u64>,

    /// Message to log on the new session
    #[clap(long)]
    pub message: Option<String>,
}

/// Arguments for the join command
#[derive(Args)]
pub struct JoinArgs {
    /// Token printed by `mint`
    #[clap(long)]
    pub token: String,

    /// Message to log on the joined session
    #[clap(long)]
    pub message: Option<String>,
}

fn parse_baggage(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;

    if key.is_empty() {
        return Err("baggage key must not be empty".to_string());
    }

    Ok((key.to_string(), value.to_string()))
}

fn start_context(config: ContextConfig) -> Result<Context> {
    let ctx = Context::builder()
        .config(config)
        .sink(Arc::new(ConsoleSink::stderr()))
        .start()
        .context("Failed to start context")?;
    ctx.register(Arc::new(SessionLogPlugin))
        .context("Failed to register session log plugin")?;
    Ok(ctx)
}

/// Implementation of the mint command
pub fn execute_mint(args: &MintArgs, config: ContextConfig) -> Result<()> {
    let ctx = start_context(config)?;

    let mut session = ctx.session().context("Failed to mint session")?;
    for (key, value) in &args.baggage {
        session = session
            .with_baggage(key, value)
            .with_context(|| format!("Failed to add baggage '{}'", key))?;
    }
    if let Some(secs) = args.deadline_secs {
        session = session.with_timeout(Duration::from_secs(secs));
    }

    if let Some(message) = &args.message {
        session.log(message.as_str());
    }

    let token = session.externalize();
    debug!(
        session = session.identity(),
        baggage = session.baggage().len(),
        token_len = token.as_str().len(),
        "minted session"
    );
    println!("{}", token);
    ctx.stop();
    Ok(())
}

/// Implementation of the join command
pub fn execute_join(args: &JoinArgs, config: ContextConfig) -> Result<()> {
    let ctx = start_context(config)?;

    let session = ctx
        .join(args.token.trim())
        .context("Failed to join session")?;
    debug!(
        session = session.identity(),
        origin = ?session.origin(),
        hops = session.hops(),
        "joined session"
    );

    if let Some(message) = &args.message {
        session.log(message.as_str());
    }

    println!("{}", session.identity());
    for (key, value) in session.baggage() {
        println!("{}={}", key, value);
    }
    if let Some(remaining) = session.remaining() {
        println!("remaining={}s", remaining.as_secs());
    }

    ctx.stop();
    Ok(())
}
