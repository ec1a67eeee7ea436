//! Startup of each service binary.
//!
//! Opening the ledger, connecting to the bus and subscribing all happen
//! before any task starts; a failure there ends the process with a nonzero
//! exit code.

use std::process::ExitCode;
use std::sync::Arc;

use bus::{Bus, NatsBus};
use ledger::{DedupLedger, SqliteLedger};
use saga::{EventConsumer, Publisher, Stage};

use crate::config::{Config, Service};
use crate::routes::orders::AppState;
use crate::runner::{RunnerError, ServiceRunner, serve_http, shutdown_signal, sweep_ledger};
use crate::telemetry;

/// Entry point of the ingestion binary.
pub async fn order_service_main() -> ExitCode {
    start(Service::OrderService, run_order_service).await
}

/// Entry point of a consumer binary; `build` creates the stage from config.
pub async fn consumer_main<S, F>(service: Service, build: F) -> ExitCode
where
    S: Stage + 'static,
    F: FnOnce(&Config) -> S,
{
    start(service, |config| async move {
        let stage = build(&config);
        run_consumer(config, stage).await
    })
    .await
}

async fn start<F, Fut>(service: Service, run: F) -> ExitCode
where
    F: FnOnce(Config) -> Fut,
    Fut: std::future::Future<Output = Result<(), RunnerError>>,
{
    let config = match Config::from_env(service) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{service}: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = telemetry::init_tracing(&config) {
        eprintln!("{service}: failed to initialize tracing: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        service = service.name(),
        addr = %config.addr(),
        nats_url = %config.nats_url,
        "starting"
    );

    match run(config).await {
        Ok(()) => {
            tracing::info!(service = service.name(), "shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(service = service.name(), error = %e, "service failed");
            ExitCode::FAILURE
        }
    }
}

/// Runs ingestion: `POST /v1/orders` publishing `OrderReceived`.
pub async fn run_order_service(config: Config) -> Result<(), RunnerError> {
    let metrics_handle =
        telemetry::install_metrics().map_err(|e| RunnerError::Telemetry(e.to_string()))?;
    let nats = NatsBus::connect(&config.nats_url, config.consumer_group.clone()).await?;
    let bus: Arc<dyn Bus> = Arc::new(nats.clone());

    let state = Arc::new(AppState::new(Publisher::new(bus)));
    let app = crate::create_app(state, metrics_handle);

    let mut runner = ServiceRunner::new();
    let shutdown = runner.shutdown_receiver();
    runner.spawn(
        "http",
        serve_http(config.addr(), app, shutdown, config.shutdown_grace),
    );

    let result = runner.run_until(shutdown_signal()).await;
    flush(&nats).await;
    result
}

/// Runs one consumer loop with its ledger sweep and liveness endpoint.
pub async fn run_consumer<S: Stage + 'static>(
    config: Config,
    stage: S,
) -> Result<(), RunnerError> {
    let metrics_handle =
        telemetry::install_metrics().map_err(|e| RunnerError::Telemetry(e.to_string()))?;
    let ledger: Arc<dyn DedupLedger> = Arc::new(SqliteLedger::open(&config.ledger_path).await?);
    let nats = NatsBus::connect(&config.nats_url, config.consumer_group.clone()).await?;
    let bus: Arc<dyn Bus> = Arc::new(nats.clone());

    let consumer = EventConsumer::new(stage, bus, Arc::clone(&ledger))
        .with_config(config.consumer_config());
    let subscription = consumer.subscribe().await?;

    let mut runner = ServiceRunner::new();

    let shutdown = runner.shutdown_receiver();
    runner.spawn("consumer", async move {
        consumer
            .run_with(subscription, shutdown)
            .await
            .map_err(RunnerError::from)
    });
    let shutdown = runner.shutdown_receiver();
    runner.spawn(
        "ledger-sweep",
        sweep_ledger(ledger, config.ledger_sweep_interval, shutdown),
    );

    let shutdown = runner.shutdown_receiver();
    runner.spawn(
        "http",
        serve_http(
            config.addr(),
            crate::liveness_router(metrics_handle),
            shutdown,
            config.shutdown_grace,
        ),
    );

    let result = runner.run_until(shutdown_signal()).await;
    flush(&nats).await;
    result
}

async fn flush(nats: &NatsBus) {
    if let Err(e) = nats.flush().await {
        tracing::warn!(error = %e, "failed to flush pending publishes");
    }
}
