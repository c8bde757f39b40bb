//! Two-context propagation walk-through

use std::sync::Arc;

use anyhow::{Context as _, Result};
use causeway_core::{Context, ContextConfig, SessionLogPlugin};
use clap::Args;

use crate::sink::ConsoleSink;

/// Arguments for the demo command
#[derive(Args)]
pub struct DemoArgs {
    /// Baggage added to the first session before it is externalized
    #[clap(long, default_value = "demo")]
    pub tenant: String,
}

fn start_context(config: &ContextConfig) -> Result<Context> {
    let ctx = Context::builder()
        .config(config.clone())
        .sink(Arc::new(ConsoleSink::stdout()))
        .start()?;
    ctx.register(Arc::new(SessionLogPlugin))?;
    Ok(ctx)
}

/// Implementation of the demo command
pub fn execute_demo(args: &DemoArgs, config: ContextConfig) -> Result<()> {
    let frontend = start_context(&config).context("Failed to start first context")?;
    let backend = start_context(&config).context("Failed to start second context")?;
    println!("started {} and {}", frontend, backend);

    let request = frontend
        .session()?
        .with_baggage("tenant", args.tenant.as_str())
        .context("Failed to tag demo session")?;
    request.log("hello from the first context");

    let token = request.externalize();
    println!("token: {}", token);

    let handled = backend.join(&token)?;
    handled.log("hello from the second context");
    println!(
        "joined {} (origin {:?}, hops {}, tenant {})",
        handled,
        handled.origin(),
        handled.hops(),
        handled.property("tenant").unwrap_or("-")
    );

    let local = backend.session()?;
    local.info("demo", "an unrelated session in the second context");

    backend.stop();
    frontend.stop();
    println!("stopped {} and {}", frontend, backend);
    Ok(())
}
