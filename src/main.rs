//! sarprep command line: run the HTTP service or process a single point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use sarprep::server::{self, AppState, SarImageResponse};
use sarprep::{GeoPoint, PipelineConfig, PipelineOrchestrator, Polarization, ProviderConfig, SentinelHubProvider};

#[derive(Parser, Debug)]
#[command(name = "sarprep")]
#[command(about = "Fetch, enhance and normalize Sentinel-1 imagery for a location")]
struct Args {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Directory for raw and enhanced images
    #[arg(long, env = "SARPREP_ARTIFACT_DIR")]
    artifact_dir: Option<PathBuf>,

    /// Polarization band to request
    #[arg(long, env = "SARPREP_BAND", default_value = "VH")]
    band: Polarization,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = "SARPREP_BIND", default_value = "0.0.0.0:5000")]
        bind: SocketAddr,
    },
    /// Process one location and print the result as JSON
    Fetch {
        #[arg(long, allow_negative_numbers = true)]
        latitude: f64,
        #[arg(long, allow_negative_numbers = true)]
        longitude: f64,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level.as_str())).init();

    let provider_config = ProviderConfig::from_env().context("provider credentials")?;
    let provider = SentinelHubProvider::new(provider_config)?;

    let mut pipeline_config = PipelineConfig {
        band: args.band,
        ..PipelineConfig::default()
    };
    if let Some(dir) = args.artifact_dir {
        pipeline_config.artifact_dir = dir;
    }
    let pipeline = PipelineOrchestrator::new(Arc::new(provider), pipeline_config)?;

    match args.command {
        Command::Serve { bind } => serve(pipeline, bind),
        Command::Fetch { latitude, longitude } => {
            let point = GeoPoint::new(latitude, longitude)?;
            let result = pipeline.run(&point)?;
            println!("{}", serde_json::to_string_pretty(&SarImageResponse::from(&result))?);
            Ok(())
        }
    }
}

fn serve(pipeline: PipelineOrchestrator, bind: SocketAddr) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    // The blocking HTTP client must not be dropped inside the runtime
    let state = AppState::new(pipeline);
    let app = server::router(state.clone());

    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(bind)
            .await
            .with_context(|| format!("failed to bind {}", bind))?;

        log::info!("Listening on {}", bind);
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                log::info!("Shutting down");
            })
            .await?;
        Ok::<(), anyhow::Error>(())
    })?;

    drop(runtime);
    drop(state);
    Ok(())
}
