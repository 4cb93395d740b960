//! # mp-md
//!
//! Market data side of the pricing pipeline.
//!
//! ## Architecture
//!
//! A [`MarketDataSource`] turns a `(currency, base, since)` request into
//! normalized [`PriceObservation`]s. A [`reader::MarketReader`] drives a
//! source, either on a timer or once, and emits every observation on the
//! data channel as a wire line until it is told to stop.
//!
//! ## Modules
//!
//! - [`ecb`]: ECB data web service adapter
//! - [`simulator`]: random-walk quote generator
//! - [`path_query`]: query engine used to pick fields out of ECB responses
//! - [`json_util`]: typed query helpers
//! - [`reader`]: timer and one-shot readers
//! - [`registry`]: builds sources and readers from their kinds

pub mod ecb;
pub mod json_util;
pub mod path_query;
pub mod reader;
pub mod registry;
pub mod simulator;

use async_trait::async_trait;
use mp_core::{PriceObservation, error::MpError};

/// A provider of FX observations.
///
/// Sources are shared with the reader task, so they must be `Send + Sync`.
/// `fetch` takes `&self`; any per-call state is local to the call.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Human-readable source name, used as a log label.
    fn name(&self) -> &str;

    /// Fetch and decode every observation for `currency` quoted against
    /// `base_currency`. An empty `since` means no lower bound.
    ///
    /// Returns observations in upstream order. On error no partial list is
    /// returned.
    async fn fetch(&self, currency: &str, base_currency: &str, since: &str) -> Result<Vec<PriceObservation>, MpError>;
}
