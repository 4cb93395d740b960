//! Random-walk quote generator for demos and dry runs.
//!
//! Each fetch returns a single quote jittered around a fixed per-currency
//! reference rate. No network access.

use async_trait::async_trait;
use mp_core::time_util::now_unix_date;
use mp_core::{PriceObservation, error::MpError};
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::MarketDataSource;

/// Reference rates the simulated quotes wander around.
const DEFAULT_FX: &[(&str, f64)] = &[
    ("AUD", 0.69373),
    ("CAD", 0.77616),
    ("EUR", 1.02166),
    ("JPY", 0.00733),
    ("NZD", 0.62524),
    ("NOK", 0.10117),
    ("GBP", 1.20256),
    ("SEK", 0.09804),
    ("CHF", 1.03716),
];

/// Reference rate for currencies missing from [`DEFAULT_FX`].
const FALLBACK_RATE: f64 = 0.75;

const BID_SPREAD: f64 = 0.00002;

/// One simulated quote, serialized as the observation payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedQuote {
    pub currency: String,
    pub base_currency: String,
    pub ask: f64,
    pub bid: f64,
    pub date: String,
    pub high_ask: f64,
    pub high_bid: f64,
    pub low_ask: f64,
    pub low_bid: f64,
    pub midpoint: f64,
}

impl SimulatedQuote {
    /// Build a quote from a uniform sample `u` in `[0, 1)`.
    fn from_sample(currency: &str, base_currency: &str, u: f64, date: String) -> Self {
        let ask = reference_rate(currency) + (u - 0.5) / 100.0;
        let bid = ask - BID_SPREAD;
        Self {
            currency: currency.to_string(),
            base_currency: base_currency.to_string(),
            ask,
            bid,
            date,
            high_ask: ask,
            high_bid: bid,
            low_ask: ask,
            low_bid: bid,
            midpoint: (ask + bid) / 2.0,
        }
    }
}

pub fn reference_rate(currency: &str) -> f64 {
    DEFAULT_FX.iter().find(|(c, _)| *c == currency).map_or(FALLBACK_RATE, |(_, r)| *r)
}

/// Simulated market data source.
#[derive(Debug, Default)]
pub struct MarketSimulator;

impl MarketSimulator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MarketDataSource for MarketSimulator {
    fn name(&self) -> &str {
        "simulator"
    }

    async fn fetch(&self, currency: &str, base_currency: &str, _since: &str) -> Result<Vec<PriceObservation>, MpError> {
        let u: f64 = rand::thread_rng().gen_range(0.0..1.0);
        let quote = SimulatedQuote::from_sample(currency, base_currency, u, now_unix_date());
        debug!("[simulator] {base_currency}_{currency} ask={:.5} bid={:.5}", quote.ask, quote.bid);

        let payload = serde_json::to_string(&quote).map_err(|e| MpError::Decode(e.to_string()))?;
        Ok(vec![PriceObservation::new(format!("{base_currency}_{currency}"), payload)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_arithmetic() {
        let q = SimulatedQuote::from_sample("AUD", "USD", 0.5, "d".into());
        assert!((q.ask - 0.69373).abs() < 1e-12);
        assert!((q.ask - q.bid - BID_SPREAD).abs() < 1e-12);
        assert!((q.midpoint - (q.ask + q.bid) / 2.0).abs() < 1e-12);
        assert_eq!(q.high_ask, q.ask);
        assert_eq!(q.low_bid, q.bid);
    }

    #[test]
    fn unknown_currency_uses_fallback() {
        assert_eq!(reference_rate("XAU"), FALLBACK_RATE);
        assert_eq!(reference_rate("JPY"), 0.00733);
    }

    #[tokio::test]
    async fn one_quote_per_fetch_within_band() {
        let sim = MarketSimulator::new();
        for _ in 0..50 {
            let obs = sim.fetch("GBP", "USD", "").await.unwrap();
            assert_eq!(obs.len(), 1);
            assert_eq!(obs[0].key, "USD_GBP");

            let v: serde_json::Value = serde_json::from_str(&obs[0].payload).unwrap();
            let ask = v["ask"].as_f64().unwrap();
            assert!((ask - 1.20256).abs() <= 0.005);
            assert_eq!(v["currency"], "GBP");
            assert_eq!(v["base_currency"], "USD");
            assert!(v["date"].as_str().unwrap().contains(" UTC "));
        }
    }
}
