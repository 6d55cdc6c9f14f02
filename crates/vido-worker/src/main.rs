//! Workflow worker binary.

use std::sync::Arc;

use reqwest::Client;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vido_ai::{ImageGenClient, ImageGenConfig, RandomSeeder, SummarizerClient, SummarizerConfig};
use vido_firestore::{FirestoreClient, VideoRepository};
use vido_queue::{RedisRunStore, WorkflowQueue};
use vido_storage::R2Client;
use vido_worker::{JobContext, ProviderGenerator, RunExecutor, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vido=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vido-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let ctx = match build_context(&config) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Failed to build worker context: {}", e);
            std::process::exit(1);
        }
    };

    let queue = match WorkflowQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create workflow queue: {}", e);
            std::process::exit(1);
        }
    };

    let run_store = match RedisRunStore::from_env() {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create run store: {}", e);
            std::process::exit(1);
        }
    };

    let executor = RunExecutor::new(config, ctx, queue, run_store);

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

fn build_context(config: &WorkerConfig) -> Result<JobContext, Box<dyn std::error::Error>> {
    let firestore = FirestoreClient::from_env()?;
    let videos = VideoRepository::new(firestore);
    let storage = R2Client::from_env()?;

    let generator = ProviderGenerator {
        image: ImageGenClient::new(ImageGenConfig::from_env())?,
        summarizer: SummarizerClient::new(SummarizerConfig::from_env()?)?,
        seeder: Arc::new(RandomSeeder),
        http: Client::new(),
        stream_base_url: config.stream_base_url.clone(),
    };

    Ok(JobContext {
        videos: Arc::new(videos),
        objects: Arc::new(storage),
        generator: Arc::new(generator),
    })
}
