use std::sync::Arc;

mod ai;
mod config;
mod db;
mod error;
mod feed;
mod models;
mod server;
mod services;

use config::Config;
use error::Result;
use server::AppState;
use services::CleanupService;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (info level by default, RUST_LOG overrides)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    // Load configuration
    let config = Config::load()?;

    let state = AppState::new(&config).await?;

    // Check for --refresh flag (one poll cycle, then exit)
    if args.len() >= 2 && args[1] == "--refresh" {
        let stats = state.ingest.run_cycle().await?;
        println!(
            "Refreshed {} sources: {} new, {} updated",
            stats.sources, stats.inserted, stats.updated
        );
        return Ok(());
    }

    // Background polling loops
    Arc::clone(&state.ingest).spawn_loop(config.poll_interval_minutes);
    let cleanup = Arc::new(CleanupService::new(
        Arc::clone(&state.repository),
        config.covers_dir.clone(),
        config.cover_ttl_hours,
        config.article_retention_days,
    ));
    cleanup.spawn_loop(config.cleanup_interval_minutes);

    server::serve(state, &config.host, config.port).await?;

    Ok(())
}
