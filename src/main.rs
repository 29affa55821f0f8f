//! pyrafill - a gap-filling tile server.
//!
//! This binary wires configuration into the engine and starts the HTTP
//! server.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pyrafill::{
    config::Config,
    fetch::HttpFetcher,
    fill::GapFillEngine,
    server::{create_router, RouterConfig},
    MemoryAncestorCache,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let engine_config = match config.engine_config() {
        Ok(engine_config) => engine_config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let fetcher = match HttpFetcher::new(&config.origin) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("pyrafill v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Source: {}{}", engine_config.source, engine_config.suffix.as_deref().unwrap_or(""));
    info!("  Origin: {}", config.origin);
    info!(
        "  Rasters: {} in / {} out, {} levels -> {} levels",
        engine_config.input.tile,
        engine_config.output.tile,
        engine_config.input.level_count(),
        engine_config.output.level_count()
    );
    info!(
        "  Fill: {} mode, {} output at quality {}{}",
        if config.backfill { "backfill" } else { "pass-through" },
        engine_config.format.name(),
        engine_config.quality,
        if config.nearest {
            ", nearest".to_string()
        } else {
            format!(", blur strength {}", config.blur_strength)
        }
    );

    let engine = match GapFillEngine::new(engine_config, fetcher) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let engine = if config.cache {
        let hints = config.cache_hints();
        info!(
            "  Ancestor cache: enabled, expiry {}s",
            hints.expiry.as_secs()
        );
        engine.with_cache(Arc::new(MemoryAncestorCache::new(hints)))
    } else {
        info!("  Ancestor cache: disabled");
        engine
    };

    let mut router_config = RouterConfig::default()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);
    if let Some(origins) = config.cors_origins.clone() {
        router_config = router_config.with_cors_origins(origins);
    }

    let router = create_router(engine, router_config);

    let addr = config.bind_address();
    info!("Listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "pyrafill=debug,tower_http=debug"
    } else {
        "pyrafill=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
