//! Structured task group for one service process.
//!
//! Every long-running part of a service (consumer loop, HTTP listener,
//! ledger sweep) is a task in one [`ServiceRunner`]. The first task to fail,
//! or an OS signal, flips a shared shutdown flag; the runner then waits for
//! every task before returning.

use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use bus::BusError;
use ledger::{DedupLedger, LedgerError};
use saga::SagaError;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config::ConfigError;

/// Errors that stop a service.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Telemetry setup failed: {0}")]
    Telemetry(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Consumer error: {0}")]
    Consumer(#[from] SagaError),

    #[error("HTTP server error: {0}")]
    Http(#[from] std::io::Error),

    #[error("Task '{name}' aborted: {reason}")]
    Join { name: String, reason: String },
}

type TaskOutput = (String, Result<(), RunnerError>);

/// Spawns tasks under one shutdown scope.
pub struct ServiceRunner {
    tasks: JoinSet<TaskOutput>,
    names: Vec<(tokio::task::Id, String)>,
    shutdown_tx: watch::Sender<bool>,
}

impl Default for ServiceRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRunner {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            tasks: JoinSet::new(),
            names: Vec::new(),
            shutdown_tx,
        }
    }

    /// A receiver that turns `true` once shutdown starts.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Adds a task. It should return once the shutdown receiver turns true.
    pub fn spawn<F>(&mut self, name: impl Into<String>, task: F)
    where
        F: Future<Output = Result<(), RunnerError>> + Send + 'static,
    {
        let name = name.into();
        let task_name = name.clone();
        let handle = self.tasks.spawn(async move { (task_name, task.await) });
        self.names.push((handle.id(), name));
    }

    /// Runs until `signal` resolves or a task finishes, then shuts every task
    /// down and waits for it.
    ///
    /// Returns the first task error. A signal-initiated shutdown in which no
    /// task fails returns `Ok(())`.
    pub async fn run_until<S>(mut self, signal: S) -> Result<(), RunnerError>
    where
        S: Future<Output = ()>,
    {
        let mut first_error = None;

        tokio::select! {
            () = signal => {
                tracing::info!("shutdown signal received");
            }
            Some(joined) = self.tasks.join_next() => {
                self.record(joined, &mut first_error);
            }
        }

        // Err only means no task holds a receiver any more.
        let _ = self.shutdown_tx.send(true);

        while let Some(joined) = self.tasks.join_next().await {
            self.record(joined, &mut first_error);
        }

        tracing::info!("all tasks stopped");
        first_error.map_or(Ok(()), Err)
    }

    fn record(
        &self,
        joined: Result<TaskOutput, tokio::task::JoinError>,
        first_error: &mut Option<RunnerError>,
    ) {
        let error = match joined {
            Ok((name, Ok(()))) => {
                tracing::info!(task = %name, "task finished");
                return;
            }
            Ok((name, Err(e))) => {
                tracing::error!(task = %name, error = %e, "task failed");
                e
            }
            Err(e) => {
                let name = self.task_name(e.id());
                tracing::error!(task = %name, error = %e, "task aborted");
                RunnerError::Join {
                    name,
                    reason: e.to_string(),
                }
            }
        };
        first_error.get_or_insert(error);
    }

    fn task_name(&self, id: tokio::task::Id) -> String {
        self.names
            .iter()
            .find(|(task_id, _)| *task_id == id)
            .map_or_else(|| "unknown".to_string(), |(_, name)| name.clone())
    }
}

/// Resolves once `shutdown` turns true or its sender is dropped.
pub async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    // An error means the sender is gone, which also ends the service.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Binds `addr` and serves `app` until shutdown.
pub async fn serve_http(
    addr: String,
    app: Router,
    shutdown: watch::Receiver<bool>,
    grace: Duration,
) -> Result<(), RunnerError> {
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "HTTP listener started");
    serve_listener(listener, app, shutdown, grace).await
}

/// Serves `app` on `listener` until shutdown, then drains in-flight
/// requests for at most `grace`.
pub async fn serve_listener(
    listener: TcpListener,
    app: Router,
    shutdown: watch::Receiver<bool>,
    grace: Duration,
) -> Result<(), RunnerError> {
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown.clone()))
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result.map_err(RunnerError::Http),
        () = wait_for_shutdown(shutdown) => {}
    }

    match tokio::time::timeout(grace, server).await {
        Ok(result) => result?,
        Err(_) => tracing::warn!(?grace, "HTTP drain deadline exceeded, dropping connections"),
    }
    tracing::info!("HTTP listener stopped");
    Ok(())
}

/// Purges expired ledger records every `every` until shutdown.
pub async fn sweep_ledger(
    ledger: Arc<dyn DedupLedger>,
    every: Duration,
    shutdown: watch::Receiver<bool>,
) -> Result<(), RunnerError> {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let stop = wait_for_shutdown(shutdown);
    tokio::pin!(stop);

    loop {
        tokio::select! {
            () = &mut stop => return Ok(()),
            _ = ticker.tick() => match ledger.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "expired ledger records purged"),
                // A failed sweep only delays cleanup; reads already ignore expired rows.
                Err(e) => tracing::warn!(error = %e, "ledger sweep failed"),
            },
        }
    }
}
