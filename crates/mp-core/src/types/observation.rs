//! Records flowing from the readers to the coordinator.
//!
//! A market data source turns one request into a list of [`PriceObservation`]s.
//! The reader frames each one as a wire line (`"{key},{payload}"`) and sends it
//! on the data channel as a [`ReaderMsg::Price`]. The coordinator splits the
//! line back apart before handing it to the publisher.

/// Separator between the key and the payload in a wire line.
pub const WIRE_SEPARATOR: char = ',';

/// One normalized observation ready for publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceObservation {
    /// Stable composite identifier (e.g. `EXR.D.AUD.EUR.SP00.A`).
    pub key: String,
    /// Serialized normalized record.
    pub payload: String,
}

impl PriceObservation {
    pub fn new(key: impl Into<String>, payload: impl Into<String>) -> Self {
        Self { key: key.into(), payload: payload.into() }
    }

    /// Frame as `"{key},{payload}"`.
    pub fn to_wire(&self) -> String {
        format!("{}{WIRE_SEPARATOR}{}", self.key, self.payload)
    }
}

/// Split a wire line on its first separator.
///
/// Returns `None` when the line has no separator. The payload may itself
/// contain separators (it is usually JSON).
pub fn split_wire(line: &str) -> Option<(&str, &str)> {
    line.split_once(WIRE_SEPARATOR)
}

/// A failed fetch for one currency, reported instead of halting the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub currency: String,
    pub reason: String,
    /// `true` when the reader stopped because of this failure.
    pub fatal: bool,
}

/// Message on the reader → coordinator data channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderMsg {
    /// A wire line produced by [`PriceObservation::to_wire`].
    Price(String),
    /// A currency could not be fetched or decoded.
    Failed(FetchFailure),
    /// Terminal marker: the reader has fully stopped.
    Done,
}

/// Parameters of a reader run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FxRequest {
    /// Currencies to fetch, in emission order.
    pub currencies: Vec<String>,
    /// Denominating currency.
    pub base_currency: String,
    /// Earliest update to request (`YYYY-MM-DD` or ISO-8601); empty for none.
    pub since: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip_keeps_payload_commas() {
        let obs = PriceObservation::new("EXR.D.AUD.EUR.SP00.A", r#"{"a":1,"b":2}"#);
        let line = obs.to_wire();
        assert_eq!(split_wire(&line), Some(("EXR.D.AUD.EUR.SP00.A", r#"{"a":1,"b":2}"#)));
    }

    #[test]
    fn split_without_separator() {
        assert_eq!(split_wire("no separator here"), None);
    }

    #[test]
    fn split_empty_payload() {
        assert_eq!(split_wire("key,"), Some(("key", "")));
    }
}
