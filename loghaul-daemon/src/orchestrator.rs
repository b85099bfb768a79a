//! Daemon orchestration -- assembly, queue drain, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `loghaul-daemon`.
//! It validates configuration, builds the ingest service and its shared
//! queue, starts a consumer task that drains the queue, and shuts everything
//! down in order when a signal arrives.
//!
//! # Shutdown Order (producers first)
//!
//! 1. Ingest service (stop accepting, cancel workers, wait for in-flight pushes)
//! 2. Queue drain task (close the queue and consume what is left)
//! 3. Uptime updater

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use loghaul_core::config::LoghaulConfig;
use loghaul_core::metrics as m;
use loghaul_core::pipeline::{HealthStatus, Pipeline};
use loghaul_ingest::{
    IngestService, IngestServiceBuilder, ListenerStats, LogRecord, QueueConsumer,
};

use crate::metrics_server;

/// Maximum records taken from the queue per drain iteration.
const DRAIN_BATCH_SIZE: usize = 256;

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LoghaulConfig,
    /// The ingest service (listener + workers).
    service: IngestService,
    /// Queue consumer, moved into the drain task on start.
    consumer: Option<QueueConsumer>,
    /// Shutdown broadcast sender (signals background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
    drain_task: Option<JoinHandle<u64>>,
    uptime_task: Option<JoinHandle<()>>,
}

impl Orchestrator {
    /// Load configuration from a file (with environment overrides) and build.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read, parsed, or
    /// validated, or if the ingest service cannot be built.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LoghaulConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    ///
    /// Installs the metrics recorder when `[metrics] enabled = true`, so it
    /// must be called inside a tokio runtime.
    pub fn build_from_config(config: LoghaulConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_daemon_metrics();
        }

        let (service, consumer) = IngestServiceBuilder::from_config(&config)
            .and_then(IngestServiceBuilder::build)
            .map_err(|e| anyhow::anyhow!("failed to build ingest service: {}", e))?;
        let (shutdown_tx, _) = broadcast::channel(4);

        tracing::info!(
            bind_address = %config.ingest.bind_address,
            port = config.ingest.port,
            framing = %config.ingest.framing,
            queue_capacity = config.queue.capacity,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            service,
            consumer: Some(consumer),
            shutdown_tx,
            start_time: Instant::now(),
            drain_task: None,
            uptime_task: None,
        })
    }

    /// Start the ingest service and background tasks.
    pub async fn start(&mut self) -> Result<()> {
        self.service
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start ingest service: {}", e))?;

        if let Some(consumer) = self.consumer.take() {
            let shutdown_rx = self.shutdown_tx.subscribe();
            self.drain_task = Some(tokio::spawn(drain_records(consumer, shutdown_rx)));
        }
        if self.config.metrics.enabled {
            let shutdown_rx = self.shutdown_tx.subscribe();
            self.uptime_task = Some(spawn_uptime_updater(self.start_time, shutdown_rx));
        }
        Ok(())
    }

    /// Start, wait for SIGTERM/SIGINT, then shut down.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(async {
            match wait_for_shutdown_signal().await {
                Ok(signal) => tracing::info!(signal = signal, "shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "signal handling failed, shutting down"),
            }
        })
        .await
    }

    /// Start, wait for `shutdown` to complete, then shut down.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        self.start().await?;
        tracing::info!("loghaul-daemon running");
        shutdown.await;
        self.shutdown().await.map(|_| ())
    }

    /// Stop the ingest service, then drain what is left in the queue.
    ///
    /// Returns the total number of records consumed by the drain task.
    pub async fn shutdown(&mut self) -> Result<u64> {
        tracing::info!("stopping ingest service");
        let stop_result = self.service.stop().await;

        let _ = self.shutdown_tx.send(());
        let drained = match self.drain_task.take() {
            Some(task) => task.await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "queue drain task failed");
                0
            }),
            None => 0,
        };
        if let Some(task) = self.uptime_task.take() {
            let _ = task.await;
        }

        stop_result.map_err(|e| anyhow::anyhow!("failed to stop ingest service: {}", e))?;
        tracing::info!(drained_records = drained, "loghaul-daemon shut down");
        Ok(drained)
    }

    /// Current health of the ingest service.
    pub async fn health(&self) -> HealthStatus {
        if self.config.metrics.enabled {
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(self.start_time.elapsed().as_secs() as f64);
        }
        self.service.health_check().await
    }

    /// Address the ingest listener is bound to (while running).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.service.local_addr()
    }

    /// Listener counters (while running).
    pub fn listener_stats(&self) -> Option<Arc<ListenerStats>> {
        self.service.stats()
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &LoghaulConfig {
        &self.config
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Consume records from the shared queue until shutdown.
///
/// Persisting or forwarding records is the job of a downstream sink;
/// the daemon logs each record at debug level. On shutdown the queue is
/// closed and whatever is still buffered is consumed before returning.
async fn drain_records(
    mut consumer: QueueConsumer,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> u64 {
    let mut drained = 0u64;
    loop {
        let batch = tokio::select! {
            batch = consumer.recv_batch(DRAIN_BATCH_SIZE) => Some(batch),
            _ = shutdown_rx.recv() => None,
        };

        match batch {
            Some(batch) if batch.is_empty() => {
                tracing::debug!("queue closed, exiting drain task");
                break;
            }
            Some(batch) => {
                drained += batch.len() as u64;
                batch.iter().for_each(log_record);
            }
            None => {
                consumer.close();
                let remaining = consumer.drain(usize::MAX);
                if !remaining.is_empty() {
                    tracing::info!(count = remaining.len(), "draining remaining queued records");
                }
                drained += remaining.len() as u64;
                remaining.iter().for_each(log_record);
                break;
            }
        }
    }
    drained
}

fn log_record(record: &LogRecord) {
    tracing::debug!(
        source = %record.source(),
        sequence = record.sequence,
        bytes = record.payload.len(),
        payload = %record.payload_lossy(),
        "record received"
    );
}

/// Record daemon-level metrics (build info).
fn record_daemon_metrics() {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
