mod files;
mod webhook;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use now_playing_common::config::Config;
use now_playing_poster::{Canvas, Placeholder, PlexArtwork, PosterPipeline, Publisher};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let mut config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    config.apply_overrides(|key| std::env::var(key).ok());
    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        std::process::exit(1);
    }

    info!(
        plex_host = config.plex.host,
        canvas = format!("{}x{}", config.canvas.width, config.canvas.height),
        output = config.output.path.display().to_string(),
        "starting now-playing"
    );

    let placeholder = match Placeholder::load(&config.output.placeholder) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to load placeholder");
            std::process::exit(1);
        }
    };

    let publisher = Arc::new(Publisher::new(&config.output.path));
    if let Err(e) = publisher.ensure_dir().await {
        error!(error = %e, "failed to create output directory");
        std::process::exit(1);
    }

    let source = match PlexArtwork::new(&config.plex) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to build artwork client");
            std::process::exit(1);
        }
    };

    let canvas = Canvas {
        width: config.canvas.width,
        height: config.canvas.height,
        allow_upscale: config.canvas.allow_upscale,
    };
    let pipeline = Arc::new(PosterPipeline::new(
        Arc::new(source),
        Arc::clone(&publisher),
        canvas,
        placeholder,
    ));

    let webhook_app = webhook::router(Arc::new(webhook::AppState::new(pipeline)));
    let output_dir = publisher
        .path()
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let static_app = files::router(&output_dir);

    let webhook_addr = format!("0.0.0.0:{}", config.server.webhook_port);
    let static_addr = format!("0.0.0.0:{}", config.server.static_port);
    let webhook_listener = bind(&webhook_addr).await;
    let static_listener = bind(&static_addr).await;

    info!(addr = webhook_addr, "webhook server listening");
    info!(
        addr = static_addr,
        dir = output_dir.display().to_string(),
        "static file server listening"
    );

    let result = tokio::try_join!(
        async { axum::serve(webhook_listener, webhook_app).await },
        async { axum::serve(static_listener, static_app).await },
    );
    if let Err(e) = result {
        error!(error = %e, "server exited");
        std::process::exit(1);
    }
}

async fn bind(addr: &str) -> tokio::net::TcpListener {
    tokio::net::TcpListener::bind(addr).await.unwrap_or_else(|e| {
        eprintln!("Failed to bind to {addr}: {e}");
        std::process::exit(1);
    })
}
