//! Pipeline coordinator.
//!
//! Owns one reader and one publisher for the life of the process. The reader
//! runs as its own task and streams [`ReaderMsg`]s over a bounded channel.
//! The coordinator forwards each price line to the publisher until the reader
//! reports `Done` or the shutdown future resolves.
//!
//! # Shutdown handshake
//!
//! ```text
//! coordinator                      reader task
//!     │── stop = true ─────────────────▶│  (drops the rest of its pass)
//!     │◀──────── ... records ... ───────│  (discarded, never published)
//!     │◀──────────── Done ──────────────│
//!     │── join ────────────────────────▶│
//! ```
//!
//! The drain wait is bounded; if `Done` does not arrive in time the reader
//! task is aborted.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mp_core::config::AppConfig;
use mp_core::{FetchFailure, FxRequest, ReaderMsg, error::MpError, split_wire};
use mp_md::MarketDataSource;
use mp_md::reader::MarketReader;
use mp_pub::Publisher;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Channel and shutdown tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub channel_capacity: usize,
    pub drain_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self { channel_capacity: config.effective_channel_capacity(), drain_timeout: config.effective_drain_timeout() }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Counters reported when the pipeline ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub published: u64,
    pub dropped_malformed: u64,
    pub fetch_failures: u64,
}

/// Why the consumption loop ended.
enum LoopEnd {
    ReaderDone,
    Interrupted,
    ChannelClosed,
    PublishFailed(MpError),
    ReaderHalted(FetchFailure),
}

impl LoopEnd {
    /// Whether the reader may still be running and must be told to stop.
    fn needs_handshake(&self) -> bool {
        matches!(self, Self::Interrupted | Self::PublishFailed(_) | Self::ReaderHalted(_))
    }
}

pub struct Coordinator {
    reader: Box<dyn MarketReader>,
    source: Arc<dyn MarketDataSource>,
    publisher: Box<dyn Publisher>,
    settings: PipelineSettings,
}

impl Coordinator {
    pub fn new(
        reader: Box<dyn MarketReader>,
        source: Arc<dyn MarketDataSource>,
        publisher: Box<dyn Publisher>,
        settings: PipelineSettings,
    ) -> Self {
        Self { reader, source, publisher, settings }
    }

    /// Run the pipeline until the reader finishes or `shutdown` resolves.
    ///
    /// The publisher's `cleanup` is always called before returning.
    pub async fn run(self, request: FxRequest, shutdown: impl Future<Output = ()>) -> Result<PipelineStats, MpError> {
        let Self { mut reader, source, mut publisher, settings } = self;

        if let Err(e) = publisher.initialise().await {
            error!("[coordinator] publisher {} failed to initialise: {e}", publisher.name());
            cleanup(publisher.as_mut()).await;
            return Err(e);
        }

        let (data_tx, mut data_rx) = mpsc::channel(settings.channel_capacity);
        let (stop_tx, stop_rx) = watch::channel(false);
        reader.initialise(data_tx, stop_rx);
        reader.set_source(source);

        info!("[coordinator] starting {} -> {}", reader.name(), publisher.name());
        let mut reader_task: JoinHandle<Result<(), MpError>> = tokio::spawn(async move { reader.run(request).await });

        let mut stats = PipelineStats::default();
        let end = consume(&mut data_rx, publisher.as_mut(), &mut stats, shutdown).await;

        if end.needs_handshake() {
            if stop_tx.send(true).is_err() {
                debug!("[coordinator] reader already gone");
            }
            drain(&mut data_rx, &mut reader_task, settings.drain_timeout).await;
        }

        let joined = join_reader(reader_task).await;
        cleanup(publisher.as_mut()).await;

        info!(
            "[coordinator] finished: {} published, {} malformed dropped, {} fetch failure(s)",
            stats.published, stats.dropped_malformed, stats.fetch_failures
        );

        match end {
            LoopEnd::PublishFailed(e) => Err(e),
            LoopEnd::ReaderHalted(f) => {
                Err(MpError::Reader(format!("reader halted after {} failed: {}", f.currency, f.reason)))
            }
            _ => joined.map(|()| stats),
        }
    }
}

/// Forward reader output to the publisher until something ends the loop.
async fn consume(
    data_rx: &mut mpsc::Receiver<ReaderMsg>,
    publisher: &mut dyn Publisher,
    stats: &mut PipelineStats,
    shutdown: impl Future<Output = ()>,
) -> LoopEnd {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("[coordinator] shutdown requested");
                return LoopEnd::Interrupted;
            }
            msg = data_rx.recv() => match msg {
                Some(ReaderMsg::Done) => {
                    info!("[coordinator] reader done");
                    return LoopEnd::ReaderDone;
                }
                Some(ReaderMsg::Price(line)) => {
                    let Some((key, payload)) = split_wire(&line) else {
                        warn!("[coordinator] malformed record dropped: {line}");
                        stats.dropped_malformed += 1;
                        continue;
                    };
                    if let Err(e) = publisher.publish(key, payload).await {
                        error!("[coordinator] publish failed for {key}: {e}");
                        return LoopEnd::PublishFailed(e);
                    }
                    stats.published += 1;
                }
                Some(ReaderMsg::Failed(failure)) => {
                    stats.fetch_failures += 1;
                    if failure.fatal {
                        error!("[coordinator] fatal fetch failure for {}: {}", failure.currency, failure.reason);
                        return LoopEnd::ReaderHalted(failure);
                    }
                    warn!("[coordinator] fetch failed for {}: {}", failure.currency, failure.reason);
                }
                None => {
                    warn!("[coordinator] data channel closed without done marker");
                    return LoopEnd::ChannelClosed;
                }
            }
        }
    }
}

/// Discard reader output until `Done`, bounded by `timeout`. Aborts the
/// reader task if the bound is hit.
async fn drain(
    data_rx: &mut mpsc::Receiver<ReaderMsg>,
    reader_task: &mut JoinHandle<Result<(), MpError>>,
    timeout: Duration,
) {
    let wait_done = async {
        let mut discarded = 0usize;
        while let Some(msg) = data_rx.recv().await {
            if msg == ReaderMsg::Done {
                break;
            }
            discarded += 1;
        }
        discarded
    };

    match tokio::time::timeout(timeout, wait_done).await {
        Ok(discarded) => debug!("[coordinator] drained, {discarded} record(s) discarded"),
        Err(_) => {
            warn!("[coordinator] reader did not finish within {timeout:?}, aborting");
            reader_task.abort();
        }
    }
}

async fn join_reader(reader_task: JoinHandle<Result<(), MpError>>) -> Result<(), MpError> {
    match reader_task.await {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(MpError::Reader(format!("reader task failed: {e}"))),
    }
}

async fn cleanup(publisher: &mut dyn Publisher) {
    if let Err(e) = publisher.cleanup().await {
        error!("[coordinator] publisher cleanup failed: {e}");
    }
}
