//! Single-pass reader.

use std::sync::Arc;

use async_trait::async_trait;
use mp_core::{FetchErrorPolicy, FxRequest, ReaderState, error::MpError};
use tracing::info;

use super::{DataSender, MarketReader, ReaderCore, StopReceiver};
use crate::MarketDataSource;

/// Fetches every currency exactly once, then sends `Done`.
pub struct OneShotReader {
    core: ReaderCore,
}

impl OneShotReader {
    pub fn new(on_fetch_error: FetchErrorPolicy) -> Self {
        Self { core: ReaderCore::new("one-shot", on_fetch_error) }
    }
}

#[async_trait]
impl MarketReader for OneShotReader {
    fn name(&self) -> &str {
        self.core.label()
    }

    fn initialise(&mut self, data_tx: DataSender, stop_rx: StopReceiver) {
        self.core.bind(data_tx, stop_rx);
    }

    fn set_source(&mut self, source: Arc<dyn MarketDataSource>) {
        self.core.set_source(source);
    }

    async fn run(&mut self, request: FxRequest) -> Result<(), MpError> {
        let mut w = self.core.start()?;
        info!("[one-shot] fetching {} currencies against {}", request.currencies.len(), request.base_currency);

        let outcome = self.core.fetch_pass(&mut w, &request, &request.since).await;
        self.core.finish(w, outcome).await;
        Ok(())
    }

    fn state(&self) -> ReaderState {
        self.core.state()
    }
}
