//! Sequential fan-out of store processing requests.
//!
//! `spawn_fan_out` walks a list of store ids in a dedicated task, sending one
//! `/process` request at a time with a fixed pause between items. Progress is
//! reported as `FanOutEvent`s over a channel; the receiver only observes and
//! never steers the loop. A failed store does not stop the run.
//!
//! `process_batch` is the single-request alternative that hands every id to
//! the backend at once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::ReportBackend;
use crate::error::EngineError;
use crate::model::{BatchRequest, ProcessParams};

/// Progress of a fan-out run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanOutEvent {
    /// The request for this store is about to be sent.
    Processing { store_id: String },
    /// The backend accepted the store.
    WarehouseComplete { store_id: String },
    /// The request for this store failed.
    Error { store_id: String, message: String },
    /// Every store was handled.
    Complete,
    /// The run was stopped early after `processed` stores.
    Cancelled { processed: usize },
}

/// Tally returned by the fan-out task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Handle to a running fan-out task.
#[derive(Debug)]
pub struct FanOut {
    pub events: mpsc::UnboundedReceiver<FanOutEvent>,
    pub handle: JoinHandle<FanOutSummary>,
}

/// Start processing `store_ids` in order in a background task.
///
/// `cancel` is only observed between stores; a request already sent is
/// always allowed to finish.
pub fn spawn_fan_out<B>(
    backend: Arc<B>,
    store_ids: Vec<String>,
    params: ProcessParams,
    delay: Duration,
    cancel: CancellationToken,
) -> FanOut
where
    B: ReportBackend + 'static,
{
    let (tx, events) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_fan_out(backend, store_ids, params, delay, cancel, tx));
    FanOut { events, handle }
}

async fn run_fan_out<B>(
    backend: Arc<B>,
    store_ids: Vec<String>,
    params: ProcessParams,
    delay: Duration,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<FanOutEvent>,
) -> FanOutSummary
where
    B: ReportBackend + 'static,
{
    let mut summary = FanOutSummary::default();
    let mut current_index = 0;

    tracing::info!(
        stores = store_ids.len(),
        delay_ms = delay.as_millis() as u64,
        "Fan-out started"
    );

    loop {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            tracing::info!(processed = current_index, "Fan-out cancelled");
            let _ = tx.send(FanOutEvent::Cancelled {
                processed: current_index,
            });
            return summary;
        }

        if current_index >= store_ids.len() {
            tracing::info!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Fan-out complete"
            );
            let _ = tx.send(FanOutEvent::Complete);
            return summary;
        }

        let store_id = store_ids[current_index].clone();
        current_index += 1;

        let _ = tx.send(FanOutEvent::Processing {
            store_id: store_id.clone(),
        });

        match backend.process_store(&store_id, &params).await {
            Ok(_) => {
                summary.succeeded += 1;
                tracing::info!(%store_id, "Store processed");
                let _ = tx.send(FanOutEvent::WarehouseComplete { store_id });
            }
            // Non-2xx replies count as failures alongside transport errors.
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(%store_id, error = %e, "Store processing failed");
                let _ = tx.send(FanOutEvent::Error {
                    store_id,
                    message: e.to_string(),
                });
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Hand every store to the backend in one request.
pub async fn process_batch<B>(
    backend: &B,
    store_ids: Vec<String>,
    params: ProcessParams,
) -> Result<serde_json::Value, EngineError>
where
    B: ReportBackend,
{
    let request = BatchRequest { store_ids, params };
    tracing::info!(stores = request.store_ids.len(), "Submitting batch processing request");
    let response = backend.process_multiple(&request).await?;
    tracing::info!("Batch processing complete");
    Ok(response)
}

/// Log a fan-out event the way the front ends report it.
pub fn log_event(event: &FanOutEvent) {
    match event {
        FanOutEvent::Processing { store_id } => {
            tracing::info!(%store_id, "Started processing warehouse")
        }
        FanOutEvent::WarehouseComplete { store_id } => {
            tracing::info!(%store_id, "Finished processing warehouse")
        }
        FanOutEvent::Error { store_id, message } => {
            tracing::error!(%store_id, error = %message, "Error processing warehouse")
        }
        FanOutEvent::Complete => tracing::info!("All warehouses processed"),
        FanOutEvent::Cancelled { processed } => {
            tracing::info!(processed, "Warehouse processing stopped")
        }
    }
}
