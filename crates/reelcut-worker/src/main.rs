//! Reel rendering binary.
//!
//! Usage: `reelcut-worker <source-video> [--preview]`. Everything else comes
//! from `REELCUT_*` environment variables (a `.env` file is honoured).

use anyhow::Context;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reelcut_worker::{Capabilities, Pipeline, WorkerConfig};

fn init_tracing() -> anyhow::Result<()> {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("reelcut=info".parse()?)
        .add_directive("opencv=warn".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let mut source = None;
    let mut preview = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--preview" => preview = true,
            other => source = Some(PathBuf::from(other)),
        }
    }
    let source = source.context("usage: reelcut-worker <source-video> [--preview]")?;

    let mut config = WorkerConfig::from_env();
    if preview {
        config = config.preview();
    }
    info!("Worker config: {:?}", config);

    let capabilities = Capabilities::from_config(&config);

    // Ctrl-C cancels the in-flight FFmpeg work
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, cancelling run");
            let _ = cancel_tx.send(true);
        }
    });

    let pipeline = Pipeline::new(config, capabilities).with_cancel(cancel_rx);
    let summary = pipeline
        .run(&source)
        .await
        .with_context(|| format!("failed to process {}", source.display()))?;

    println!("{}", summary.to_json()?);
    Ok(())
}
