//! Merges every rate source into one feed that keeps the registry current.
//!
//! Each source runs in its own task and is resubscribed after a fixed delay
//! whenever it fails, forever. Batches from all sources share one channel and
//! a single consumer applies them to the registry.

use crate::core::rates::{RateBatch, RateSource, ticker};
use crate::core::registry::UnitRegistry;
use anyhow::Result;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 64;

struct AbortOnDrop(Vec<JoinHandle<()>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Interleaves batches from all `sources` in arrival order.
///
/// Source tasks stop when the returned stream is dropped.
pub fn merge(
    sources: Vec<Arc<dyn RateSource>>,
    retry_delay: Duration,
) -> BoxStream<'static, RateBatch> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let handles = sources
        .into_iter()
        .map(|source| tokio::spawn(watch_source(source, tx.clone(), retry_delay)))
        .collect();
    drop(tx);

    let guard = AbortOnDrop(handles);
    futures::stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let batch = rx.recv().await?;
        Some((batch, (rx, guard)))
    })
    .boxed()
}

async fn watch_source(
    source: Arc<dyn RateSource>,
    tx: mpsc::Sender<RateBatch>,
    retry_delay: Duration,
) {
    let start_delay = source.start_delay();
    if !start_delay.is_zero() {
        debug!("Delaying {} by {start_delay:?}", source.name());
        tokio::time::sleep(start_delay).await;
    }

    loop {
        match subscribe(&source, &tx).await {
            Ok(()) if tx.is_closed() => return,
            Ok(()) => warn!("Rate source {} ended, resubscribing", source.name()),
            Err(e) => warn!("Rate source {} failed: {e:#}", source.name()),
        }
        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(retry_delay).await;
    }
}

/// Lists the source's codes and forwards its ticker until it fails or ends.
async fn subscribe(source: &Arc<dyn RateSource>, tx: &mpsc::Sender<RateBatch>) -> Result<()> {
    let codes = source.list_currencies().await?;
    debug!("{} lists {} codes", source.name(), codes.len());

    let mut batches = ticker(Arc::clone(source), codes);
    while let Some(batch) = batches.next().await {
        if tx.send(batch?).await.is_err() {
            return Ok(());
        }
    }
    Ok(())
}

/// Handle to the background task feeding the registry.
pub struct RateFeed {
    shutdown: Option<oneshot::Sender<()>>,
    consumer: JoinHandle<()>,
}

/// Starts polling `sources` and applying their batches to `registry`.
pub fn spawn(
    sources: Vec<Arc<dyn RateSource>>,
    registry: Arc<UnitRegistry>,
    retry_delay: Duration,
) -> RateFeed {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
    info!("Starting rate feed with {} sources", sources.len());
    let mut batches = merge(sources, retry_delay);

    let consumer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                batch = batches.next() => match batch {
                    Some(batch) => {
                        let report = registry.apply_batch(&batch);
                        debug!(
                            "Applied {} rates from {} ({} rejected)",
                            report.applied,
                            batch.source,
                            report.rejected.len()
                        );
                    }
                    None => break,
                },
            }
        }
        debug!("Rate feed stopped");
    });

    RateFeed {
        shutdown: Some(shutdown_tx),
        consumer,
    }
}

impl RateFeed {
    /// Stops every source subscription and waits for the consumer to exit.
    ///
    /// A batch is either fully applied or not at all.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.consumer).await {
            warn!("Rate feed task failed: {e}");
        }
    }
}
