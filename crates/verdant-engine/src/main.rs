//! # Verdant Engine
//!
//! Main entry point for Project Verdant: runs the configured experiences
//! headless and logs what they do.
//!
//! Usage: `verdant [config.toml]`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use verdant_engine::app;
use verdant_engine::config::{read_log_filter, AppConfig, CONFIG_FILE, DEFAULT_LOG_FILTER};

/// Main entry point.
fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);

    // Initialize tracing
    let directives = read_log_filter(config_path.as_deref().unwrap_or(CONFIG_FILE))
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    let mut filter = EnvFilter::from_default_env();
    for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        filter = filter.add_directive(directive.parse()?);
    }
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    info!("Project Verdant starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match &config_path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let summary = app::run(config)?;

    info!(
        "Ran {} frames ({:.2}s simulated), {} experiences ready, {} failed, {} uploads",
        summary.frames, summary.elapsed, summary.ready, summary.failed, summary.uploads
    );
    info!("Project Verdant shutdown complete");
    Ok(())
}
