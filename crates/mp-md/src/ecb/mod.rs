//! ECB data web service adapter.
//!
//! One request per currency pair:
//!
//! ```text
//! GET {service_root}/data/{flow_ref}/{freq}.{currency}.{base}.{exr_type}.{variation}
//!     ?updatedAfter={since}&format=jsondata
//! ```
//!
//! The response is decoded by [`json_parser`] into one observation per dated
//! value in the series.

pub mod json_parser;

use std::time::Duration;

use async_trait::async_trait;
use mp_core::config::EcbConfig;
use mp_core::{PriceObservation, error::MpError};
use tracing::{debug, warn};

use crate::MarketDataSource;

/// ECB exchange-rate source.
pub struct EcbSource {
    config: EcbConfig,
    http: reqwest::Client,
}

impl EcbSource {
    pub fn new(config: EcbConfig) -> Result<Self, MpError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_sec))
            .build()
            .map_err(|e| MpError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    /// Request URL for one currency pair.
    pub fn request_url(&self, currency: &str, base_currency: &str, since: &str) -> String {
        let c = &self.config;
        let mut url = format!(
            "{}/data/{}/{}.{currency}.{base_currency}.{}.{}",
            c.service_root.trim_end_matches('/'),
            c.flow_ref,
            c.frequency,
            c.exr_type,
            c.series_variation,
        );
        if since.is_empty() {
            url.push_str("?format=jsondata");
        } else {
            url.push_str("?updatedAfter=");
            url.push_str(&urlencoding::encode(since));
            url.push_str("&format=jsondata");
        }
        url
    }

    /// Issue the request and return the body.
    ///
    /// The no-results body is returned as-is whatever the status code; the
    /// service answers it with a 404.
    async fn request_body(&self, url: &str) -> Result<String, MpError> {
        let resp = self.http.get(url).send().await.map_err(|e| MpError::Transport(format!("GET {url}: {e}")))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| MpError::Transport(format!("GET {url}: reading body: {e}")))?;

        if json_parser::is_no_results(&body) {
            return Ok(body);
        }
        if !status.is_success() {
            return Err(MpError::Transport(format!("GET {url}: HTTP {status}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl MarketDataSource for EcbSource {
    fn name(&self) -> &str {
        "ecb"
    }

    async fn fetch(&self, currency: &str, base_currency: &str, since: &str) -> Result<Vec<PriceObservation>, MpError> {
        let url = self.request_url(currency, base_currency, since);
        debug!("[ecb] GET {url}");

        let body = self.request_body(&url).await?;
        if json_parser::is_no_results(&body) {
            warn!("[ecb] no results for {currency}/{base_currency} updated after '{since}'");
            return Ok(Vec::new());
        }

        let observations = json_parser::decode_response(&body, &self.config.flow_ref)?;
        debug!("[ecb] {currency}/{base_currency}: {} observation(s)", observations.len());
        Ok(observations)
    }
}
