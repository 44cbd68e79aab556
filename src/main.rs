use anyhow::Context;
use clap::Parser;
use dataset_stream::dataset;
use dataset_stream::kafka::KafkaTransport;
use dataset_stream::{BatchPublisher, Config, PublishSettings, RunStatus, TracingSink};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Startup failed: bad arguments, configuration, dataset, or producer.
const EXIT_FAILURE: u8 = 1;
/// The run started but stopped before every row was submitted.
const EXIT_ABORTED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "dataset-stream", version)]
#[command(about = "Stream a CSV or Parquet dataset into Kafka, one message per row", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_FAILURE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let json_logs = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    init_logging(json_logs);

    match run(args).await {
        Ok(RunStatus::Completed) => ExitCode::SUCCESS,
        Ok(RunStatus::Aborted { .. }) => ExitCode::from(EXIT_ABORTED),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<RunStatus> {
    info!("Loading configuration from {:?}", args.config);
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Error loading configuration from {}", args.config.display()))?;

    info!(
        dataset = %config.local_dataset_path.display(),
        topic = %config.topic,
        kafka_endpoint = %config.kafka_endpoint.bootstrap_servers(),
        batch_size = config.batch_size,
        sleep_time = config.sleep_time,
        drain_timeout = config.drain_timeout,
        "Configuration summary"
    );

    let path = config.local_dataset_path.clone();
    let (format, records) = tokio::task::spawn_blocking(move || dataset::load(&path))
        .await
        .context("Dataset loader task failed")?
        .with_context(|| {
            format!(
                "Failed to load dataset {}",
                config.local_dataset_path.display()
            )
        })?;
    info!(rows = records.len(), "{} file loaded.", format);

    let transport = KafkaTransport::new(&config).context("Failed to create Kafka producer")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Shutdown requested, draining in-flight messages");
            let _ = shutdown_tx.send(true);
        }
    });

    let publisher = BatchPublisher::new(
        transport,
        PublishSettings::from_config(&config),
        Arc::new(TracingSink),
    )
    .with_shutdown(shutdown_rx);

    let summary = publisher.publish(&records, &config.topic).await;
    Ok(summary.status)
}

fn init_logging(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dataset_stream=info,warn"));

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
