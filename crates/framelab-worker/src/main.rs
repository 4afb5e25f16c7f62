//! Media processing worker binary.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use framelab_queue::JobQueue;
use framelab_worker::{JobExecutor, Pipeline, Timeouts, WorkerConfig, WorkerContext};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter =
        EnvFilter::from_default_env().add_directive("aws_config=warn".parse().unwrap());
    for target in [
        "framelab_worker",
        "framelab_queue",
        "framelab_media",
        "framelab_storage",
        "framelab_db",
        "framelab_ml_client",
    ] {
        env_filter = env_filter.add_directive(format!("{target}=info").parse().unwrap());
    }

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

    info!("Starting framelab-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if config.metrics_enabled {
        match PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.metrics_port))
            .install()
        {
            Ok(()) => info!("Prometheus metrics on port {}", config.metrics_port),
            Err(e) => error!("Failed to install metrics exporter: {}", e),
        }
    }

    let ctx = match WorkerContext::from_env(&config) {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            error!("Failed to create worker context: {}", e);
            std::process::exit(1);
        }
    };

    let queue = match JobQueue::from_env() {
        Ok(q) => Arc::new(q),
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    let timeouts = Timeouts {
        soft: config.soft_timeout,
        hard: config.hard_timeout,
    };
    let pipeline = Arc::new(Pipeline::new(ctx, queue.clone(), timeouts));
    let executor = Arc::new(JobExecutor::new(config, queue, pipeline));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_executor.shutdown();
        }
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
