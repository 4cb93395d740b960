//! Interval-driven reader.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mp_core::time_util::now_watermark;
use mp_core::{FetchErrorPolicy, FxRequest, ReaderState, SincePolicy, error::MpError};
use tokio::time::MissedTickBehavior;
use tracing::info;

use super::{DataSender, MarketReader, PassOutcome, ReaderCore, StopReceiver, wait_for_stop};
use crate::MarketDataSource;

/// Fetches every currency once per tick until stopped.
///
/// The first tick fires one period after `run` starts unless `poll_on_start`
/// is set. The stop signal is watched while waiting for a tick as well as
/// while sending.
pub struct TimeReader {
    core: ReaderCore,
    period: Duration,
    poll_on_start: bool,
    since_policy: SincePolicy,
}

impl TimeReader {
    pub fn new(
        period: Duration,
        poll_on_start: bool,
        since_policy: SincePolicy,
        on_fetch_error: FetchErrorPolicy,
    ) -> Self {
        Self { core: ReaderCore::new("time-reader", on_fetch_error), period, poll_on_start, since_policy }
    }
}

#[async_trait]
impl MarketReader for TimeReader {
    fn name(&self) -> &str {
        self.core.label()
    }

    fn initialise(&mut self, data_tx: DataSender, stop_rx: StopReceiver) {
        self.core.bind(data_tx, stop_rx);
        info!("[time-reader] initialised, period {:?}", self.period);
    }

    fn set_source(&mut self, source: Arc<dyn MarketDataSource>) {
        self.core.set_source(source);
    }

    async fn run(&mut self, request: FxRequest) -> Result<(), MpError> {
        let mut w = self.core.start()?;
        let mut since = request.since.clone();

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !self.poll_on_start {
            ticker.tick().await; // the first tick completes immediately
        }

        info!(
            "[time-reader] polling {} currencies against {} every {:?}",
            request.currencies.len(),
            request.base_currency,
            self.period
        );

        let outcome = loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = wait_for_stop(&mut w.stop) => break PassOutcome::Stopped,
            }

            match self.core.fetch_pass(&mut w, &request, &since).await {
                PassOutcome::Completed { clean } => {
                    if clean && self.since_policy == SincePolicy::Advance {
                        since = now_watermark();
                        info!("[time-reader] since advanced to {since}");
                    }
                }
                other => break other,
            }
        };

        self.core.finish(w, outcome).await;
        Ok(())
    }

    fn state(&self) -> ReaderState {
        self.core.state()
    }
}

#[cfg(test)]
mod tests {
    use mp_core::ReaderMsg;
    use tokio::sync::{mpsc, watch};

    use super::super::tests::{ScriptedSource, request};
    use super::*;

    const PERIOD: Duration = Duration::from_millis(20);

    async fn recv(rx: &mut mpsc::Receiver<ReaderMsg>) -> ReaderMsg {
        tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap()
    }

    fn spawn_reader(
        mut reader: TimeReader,
        source: Arc<ScriptedSource>,
        currencies: &[&str],
        capacity: usize,
    ) -> (mpsc::Receiver<ReaderMsg>, watch::Sender<bool>, tokio::task::JoinHandle<TimeReader>) {
        let (tx, rx) = mpsc::channel(capacity);
        let (stop_tx, stop_rx) = watch::channel(false);
        reader.initialise(tx, stop_rx);
        reader.set_source(source);
        let req = request(currencies);
        let task = tokio::spawn(async move {
            reader.run(req).await.unwrap();
            reader
        });
        (rx, stop_tx, task)
    }

    #[tokio::test]
    async fn polls_every_tick_until_stopped() {
        let source = Arc::new(ScriptedSource::new(2));
        let reader = TimeReader::new(PERIOD, true, SincePolicy::Fixed, FetchErrorPolicy::Skip);
        let (mut rx, stop_tx, task) = spawn_reader(reader, source.clone(), &["AUD", "JPY"], 16);

        // Two full ticks: AUD x2, JPY x2 each time.
        for _ in 0..2 {
            for key in ["EUR.AUD", "EUR.AUD", "EUR.JPY", "EUR.JPY"] {
                match recv(&mut rx).await {
                    ReaderMsg::Price(line) => assert!(line.starts_with(key), "{line}"),
                    other => panic!("unexpected {other:?}"),
                }
            }
        }

        stop_tx.send(true).unwrap();
        loop {
            if recv(&mut rx).await == ReaderMsg::Done {
                break;
            }
        }
        let reader = task.await.unwrap();
        assert_eq!(reader.state(), ReaderState::Terminated);

        // Fixed policy: every request used the configured watermark.
        assert!(source.calls().iter().all(|(_, since)| since == "2022-01-01"));
    }

    #[tokio::test]
    async fn stop_while_waiting_for_tick() {
        let source = Arc::new(ScriptedSource::new(1));
        let reader = TimeReader::new(Duration::from_secs(3600), false, SincePolicy::Fixed, FetchErrorPolicy::Skip);
        let (mut rx, stop_tx, task) = spawn_reader(reader, source.clone(), &["AUD"], 1);

        stop_tx.send(true).unwrap();
        assert_eq!(recv(&mut rx).await, ReaderMsg::Done);
        task.await.unwrap();
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn stop_drops_rest_of_tick() {
        let source = Arc::new(ScriptedSource::new(5));
        let reader = TimeReader::new(PERIOD, true, SincePolicy::Fixed, FetchErrorPolicy::Skip);
        let (mut rx, stop_tx, task) = spawn_reader(reader, source, &["AUD"], 1);

        // First record fills the channel; the reader then blocks on the second.
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop_tx.send(true).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(recv(&mut rx).await, ReaderMsg::Price(_)));
        assert_eq!(recv(&mut rx).await, ReaderMsg::Done);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn advance_moves_since_after_clean_tick() {
        let source = Arc::new(ScriptedSource::new(1));
        let reader = TimeReader::new(PERIOD, true, SincePolicy::Advance, FetchErrorPolicy::Skip);
        let (mut rx, stop_tx, task) = spawn_reader(reader, source.clone(), &["AUD"], 16);

        recv(&mut rx).await;
        recv(&mut rx).await;
        stop_tx.send(true).unwrap();
        while recv(&mut rx).await != ReaderMsg::Done {}
        task.await.unwrap();

        let calls = source.calls();
        assert_eq!(calls[0].1, "2022-01-01");
        assert_ne!(calls[1].1, "2022-01-01");
        assert!(calls[1].1.ends_with("+00:00"), "{}", calls[1].1);
    }

    #[tokio::test]
    async fn advance_holds_since_after_failed_tick() {
        let source = Arc::new(ScriptedSource::new(1).failing("JPY"));
        let reader = TimeReader::new(PERIOD, true, SincePolicy::Advance, FetchErrorPolicy::Skip);
        let (mut rx, stop_tx, task) = spawn_reader(reader, source.clone(), &["AUD", "JPY"], 16);

        // Two ticks of (AUD price, JPY failure).
        for _ in 0..2 {
            assert!(matches!(recv(&mut rx).await, ReaderMsg::Price(_)));
            match recv(&mut rx).await {
                ReaderMsg::Failed(f) => {
                    assert_eq!(f.currency, "JPY");
                    assert!(!f.fatal);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        stop_tx.send(true).unwrap();
        while recv(&mut rx).await != ReaderMsg::Done {}
        task.await.unwrap();

        assert!(source.calls().iter().all(|(_, since)| since == "2022-01-01"));
    }

    #[tokio::test]
    async fn halt_policy_ends_the_reader() {
        let source = Arc::new(ScriptedSource::new(1).failing("AUD"));
        let reader = TimeReader::new(PERIOD, true, SincePolicy::Fixed, FetchErrorPolicy::Halt);
        let (mut rx, _stop_tx, task) = spawn_reader(reader, source.clone(), &["AUD", "JPY"], 16);

        match recv(&mut rx).await {
            ReaderMsg::Failed(f) => assert!(f.fatal),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(recv(&mut rx).await, ReaderMsg::Done);
        task.await.unwrap();
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn run_without_initialise_fails() {
        let mut reader = TimeReader::new(PERIOD, true, SincePolicy::Fixed, FetchErrorPolicy::Skip);
        reader.set_source(Arc::new(ScriptedSource::new(1)));
        assert!(matches!(reader.run(request(&["AUD"])).await, Err(MpError::Reader(_))));
        assert_eq!(reader.state(), ReaderState::Idle);
    }
}
