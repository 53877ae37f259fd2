//! Background flush task

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::engine::{AggregatedRow, StreamingAggregator};

/// Spawn a task that drains `aggregator` every `interval` and hands each
/// non-empty batch to `sink`.
///
/// A final flush runs when `shutdown` fires (or its sender is dropped), so
/// nothing aggregated before shutdown is lost.
pub fn spawn_flush_task<F>(
    aggregator: Arc<StreamingAggregator>,
    interval: Duration,
    mut sink: F,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()>
where
    F: FnMut(Vec<AggregatedRow>) + Send + 'static,
{
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting aggregator flush task");

        let mut ticker = tokio::time::interval(interval);
        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let rows = aggregator.get_rows();
                    if !rows.is_empty() {
                        debug!(rows = rows.len(), "Periodic flush");
                        sink(rows);
                    }
                }
                _ = shutdown.recv() => {
                    debug!("Aggregator flush task shutting down");
                    break;
                }
            }
        }

        let rows = aggregator.get_rows();
        if !rows.is_empty() {
            debug!(rows = rows.len(), "Final flush");
            sink(rows);
        }
        info!("Aggregator flush task stopped");
    })
}
