//! Readers: drive a [`MarketDataSource`] and stream its observations.
//!
//! A reader is wired with a data channel (reader → coordinator) and a stop
//! channel (coordinator → reader), given a source, then run. Every
//! observation goes out as a [`ReaderMsg::Price`] wire line. Each send races
//! against the stop signal. Once stop is seen the remaining records of the
//! pass are dropped and the reader sends [`ReaderMsg::Done`] and terminates.
//!
//! ```text
//! Idle ──initialise──▶ Initialised ──run──▶ Running
//!                                              │
//!                                          stop/end
//!                                              ▼
//!                    Terminated ◀──Done sent── Draining
//! ```

pub mod one_shot;
pub mod timer;

use std::sync::Arc;

use async_trait::async_trait;
use mp_core::{FetchErrorPolicy, FetchFailure, FxRequest, ReaderMsg, ReaderState, error::MpError};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::MarketDataSource;

pub use one_shot::OneShotReader;
pub use timer::TimeReader;

/// Reader → coordinator channel.
pub type DataSender = mpsc::Sender<ReaderMsg>;
/// Coordinator → reader stop signal; `true` means stop.
pub type StopReceiver = watch::Receiver<bool>;

/// A reader drives one source over a currency list.
#[async_trait]
pub trait MarketReader: Send {
    fn name(&self) -> &str;

    /// Bind the data and stop channels.
    fn initialise(&mut self, data_tx: DataSender, stop_rx: StopReceiver);

    fn set_source(&mut self, source: Arc<dyn MarketDataSource>);

    /// Run until the pass (or the timer) ends or stop is requested.
    ///
    /// Fails immediately if the reader is not fully wired. Otherwise always
    /// ends by sending [`ReaderMsg::Done`].
    async fn run(&mut self, request: FxRequest) -> Result<(), MpError>;

    fn state(&self) -> ReaderState;
}

// ---------------------------------------------------------------------------
// Stop signal
// ---------------------------------------------------------------------------

/// Whether stop has been requested. A dropped stop sender counts as stop.
pub fn stop_requested(stop: &StopReceiver) -> bool {
    *stop.borrow() || stop.has_changed().is_err()
}

/// Resolve once stop is requested (or the stop sender is gone).
pub async fn wait_for_stop(stop: &mut StopReceiver) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Shared reader core
// ---------------------------------------------------------------------------

/// How a fetch pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every currency was visited. `clean` is false if any fetch failed.
    Completed { clean: bool },
    /// Stop was observed (or the coordinator went away).
    Stopped,
    /// A fetch failed under [`FetchErrorPolicy::Halt`].
    Halted,
}

/// Channels and source taken out of the core for one run.
pub struct Wiring {
    tx: DataSender,
    stop: StopReceiver,
    source: Arc<dyn MarketDataSource>,
}

/// State and behaviour shared by every reader kind.
pub struct ReaderCore {
    label: &'static str,
    data_tx: Option<DataSender>,
    stop_rx: Option<StopReceiver>,
    source: Option<Arc<dyn MarketDataSource>>,
    on_fetch_error: FetchErrorPolicy,
    state: ReaderState,
}

impl ReaderCore {
    pub fn new(label: &'static str, on_fetch_error: FetchErrorPolicy) -> Self {
        Self { label, data_tx: None, stop_rx: None, source: None, on_fetch_error, state: ReaderState::Idle }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn bind(&mut self, data_tx: DataSender, stop_rx: StopReceiver) {
        self.data_tx = Some(data_tx);
        self.stop_rx = Some(stop_rx);
        self.state = ReaderState::Initialised;
    }

    pub fn set_source(&mut self, source: Arc<dyn MarketDataSource>) {
        info!("[{}] source set to {}", self.label, source.name());
        self.source = Some(source);
    }

    /// Take the wiring out of the core and enter `Running`.
    ///
    /// The data sender moves into the run, so the channel closes as soon as
    /// the run (or its task) ends.
    pub fn start(&mut self) -> Result<Wiring, MpError> {
        if self.data_tx.is_none() || self.stop_rx.is_none() {
            return Err(self.not_ready("channels not initialised"));
        }
        let Some(source) = self.source.clone() else {
            return Err(self.not_ready("no market data source set"));
        };
        let (Some(tx), Some(stop)) = (self.data_tx.take(), self.stop_rx.take()) else {
            return Err(self.not_ready("channels not initialised"));
        };
        self.state = ReaderState::Running;
        Ok(Wiring { tx, stop, source })
    }

    fn not_ready(&self, what: &str) -> MpError {
        error!("[{}] cannot run: {what}", self.label);
        MpError::Reader(format!("{}: {what}", self.label))
    }

    /// Fetch every currency in order and emit its observations.
    pub async fn fetch_pass(&self, w: &mut Wiring, request: &FxRequest, since: &str) -> PassOutcome {
        let mut clean = true;

        for currency in &request.currencies {
            if stop_requested(&w.stop) {
                return PassOutcome::Stopped;
            }

            let fetched = tokio::select! {
                r = w.source.fetch(currency, &request.base_currency, since) => r,
                _ = wait_for_stop(&mut w.stop) => return PassOutcome::Stopped,
            };

            match fetched {
                Ok(observations) => {
                    debug!("[{}] {currency}: {} record(s)", self.label, observations.len());
                    for obs in observations {
                        if !self.emit(w, ReaderMsg::Price(obs.to_wire())).await {
                            return PassOutcome::Stopped;
                        }
                    }
                }
                Err(e) => {
                    clean = false;
                    let fatal = self.on_fetch_error == FetchErrorPolicy::Halt;
                    if fatal {
                        error!("[{}] fetch failed for {currency}, halting: {e}", self.label);
                    } else {
                        warn!("[{}] fetch failed for {currency}, skipping: {e}", self.label);
                    }
                    let failure = FetchFailure { currency: currency.clone(), reason: e.to_string(), fatal };
                    if !self.emit(w, ReaderMsg::Failed(failure)).await {
                        return PassOutcome::Stopped;
                    }
                    if fatal {
                        return PassOutcome::Halted;
                    }
                }
            }
        }

        PassOutcome::Completed { clean }
    }

    /// Send one message unless stop wins the race. Returns `false` if the
    /// message was dropped.
    async fn emit(&self, w: &mut Wiring, msg: ReaderMsg) -> bool {
        if stop_requested(&w.stop) {
            return false;
        }
        tokio::select! {
            sent = w.tx.send(msg) => {
                if sent.is_err() {
                    warn!("[{}] data channel closed", self.label);
                    return false;
                }
                true
            }
            _ = wait_for_stop(&mut w.stop) => {
                debug!("[{}] stop received, dropping remaining records", self.label);
                false
            }
        }
    }

    /// Send the terminal marker and enter `Terminated`.
    pub async fn finish(&mut self, w: Wiring, outcome: PassOutcome) {
        self.state = ReaderState::Draining;
        if w.tx.send(ReaderMsg::Done).await.is_err() {
            debug!("[{}] data channel closed before done marker", self.label);
        }
        self.state = ReaderState::Terminated;
        info!("[{}] terminated ({outcome:?})", self.label);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use mp_core::PriceObservation;

    use super::*;

    /// Source returning `per_call` records per currency, failing for the
    /// currencies in `fail`. Records every `since` it was called with.
    pub(crate) struct ScriptedSource {
        pub per_call: usize,
        pub fail: HashSet<String>,
        pub calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedSource {
        pub fn new(per_call: usize) -> Self {
            Self { per_call, fail: HashSet::new(), calls: Mutex::new(Vec::new()) }
        }

        pub fn failing(mut self, currency: &str) -> Self {
            self.fail.insert(currency.to_string());
            self
        }

        pub fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MarketDataSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch(&self, currency: &str, base: &str, since: &str) -> Result<Vec<PriceObservation>, MpError> {
            self.calls.lock().unwrap().push((currency.to_string(), since.to_string()));
            if self.fail.contains(currency) {
                return Err(MpError::Transport(format!("{currency} unavailable")));
            }
            Ok((0..self.per_call)
                .map(|i| PriceObservation::new(format!("{base}.{currency}"), format!("{i}")))
                .collect())
        }
    }

    pub(crate) fn request(currencies: &[&str]) -> FxRequest {
        FxRequest {
            currencies: currencies.iter().map(|c| c.to_string()).collect(),
            base_currency: "EUR".into(),
            since: "2022-01-01".into(),
        }
    }

    #[tokio::test]
    async fn dropped_stop_sender_counts_as_stop() {
        let (tx, rx) = watch::channel(false);
        assert!(!stop_requested(&rx));
        drop(tx);
        assert!(stop_requested(&rx));
    }

    #[tokio::test]
    async fn wait_for_stop_sees_earlier_signal() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), wait_for_stop(&mut rx)).await.unwrap();
    }

    #[test]
    fn start_requires_channels_and_source() {
        let mut core = ReaderCore::new("test", FetchErrorPolicy::Skip);
        assert!(matches!(core.start(), Err(MpError::Reader(_))));

        let (tx, _rx) = mpsc::channel(1);
        let (_stop_tx, stop_rx) = watch::channel(false);
        core.bind(tx, stop_rx);
        assert_eq!(core.state(), ReaderState::Initialised);
        let err = core.start().err().unwrap();
        assert!(err.to_string().contains("source"));

        core.set_source(Arc::new(ScriptedSource::new(1)));
        assert!(core.start().is_ok());
        assert_eq!(core.state(), ReaderState::Running);
    }
}
