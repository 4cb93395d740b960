//! Registry: builds sources and readers from their resolved kinds.

use std::sync::Arc;

use mp_core::config::AppConfig;
use mp_core::{ReaderKind, SourceKind, error::MpError};
use tracing::info;

use crate::MarketDataSource;
use crate::ecb::EcbSource;
use crate::reader::{MarketReader, OneShotReader, TimeReader};
use crate::simulator::MarketSimulator;

/// Create the market data source for `kind`.
pub fn create_source(kind: SourceKind, config: &AppConfig) -> Result<Arc<dyn MarketDataSource>, MpError> {
    info!("[registry] market data source: {kind}");
    Ok(match kind {
        SourceKind::Simulator => Arc::new(MarketSimulator::new()),
        SourceKind::Ecb => Arc::new(EcbSource::new(config.effective_ecb())?),
    })
}

/// Create the reader for `kind`. The reader still needs channels and a source.
pub fn create_reader(kind: ReaderKind, config: &AppConfig) -> Box<dyn MarketReader> {
    info!("[registry] reader: {kind}");
    match kind {
        ReaderKind::TimeReader => Box::new(TimeReader::new(
            config.effective_poll_interval(),
            config.effective_poll_on_start(),
            config.effective_since_policy(),
            config.effective_fetch_error_policy(),
        )),
        ReaderKind::OneShot => Box::new(OneShotReader::new(config.effective_fetch_error_policy())),
    }
}
