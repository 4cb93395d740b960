//! ECB `jsondata` response decoder.
//!
//! An ECB response holds one series (the requested currency pair) with a
//! variable number of dated observations. The series header lives under
//! `structure.dimensions.series`, the observation dates under
//! `structure.dimensions.observation[0].values`, and the values themselves
//! under `dataSets[0].series."0:0:0:0:0".observations`, keyed `"0"`, `"1"`, ...
//!
//! Every field is extracted with a path query. Indexed fields are queried by
//! substituting the observation index into the query text.

use mp_core::{PriceObservation, error::MpError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::json_util::{query_count, query_f64, query_str};
use crate::path_query::QueryError;

/// Body returned by the ECB service when the filter matches nothing.
pub const NO_RESULTS: &str = "No results found.";

/// Key of the single default series in a one-pair response.
const SERIES_KEY: &str = "0:0:0:0:0";

const Q_SENDER: &str = ".header.sender.id";
const Q_FREQ: &str = r#".structure.dimensions.series[] | select(.id=="FREQ") | .values[0].id"#;
const Q_CURRENCY: &str = r#".structure.dimensions.series[] | select(.id=="CURRENCY") | .values[0].id"#;
const Q_CURRENCY_DENOM: &str = r#".structure.dimensions.series[] | select(.id=="CURRENCY_DENOM") | .values[0].id"#;
const Q_EXR_TYPE: &str = r#".structure.dimensions.series[] | select(.id=="EXR_TYPE") | .values[0].id"#;
const Q_EXR_SUFFIX: &str = r#".structure.dimensions.series[] | select(.id=="EXR_SUFFIX") | .values[0].id"#;
const Q_TIME_FORMAT: &str = r#".structure.attributes.series[] | select(.id=="TIME_FORMAT") | .values[0].name"#;
const Q_OBS_STATUS: &str = r#".structure.attributes.observation[] | select(.id=="OBS_STATUS") | .values[0].id"#;
const Q_DATE_VALUES: &str = ".structure.dimensions.observation[0].values";

/// One normalized ECB observation, laid out like the ECB CSV download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EcbRecord {
    pub key: String,
    pub freq: String,
    pub currency: String,
    pub currency_denom: String,
    pub sender: String,
    pub exr_type: String,
    pub exr_suffix: String,
    #[serde(rename = "starttime-period")]
    pub start_time_period: String,
    pub end_time_period: String,
    pub obs_value: f64,
    pub obs_status: String,
    pub time_format: String,
}

fn rate_query(index: usize) -> String {
    format!(r#".dataSets[0].series."{SERIES_KEY}".observations."{index}"[0]"#)
}

fn start_query(index: usize) -> String {
    format!("{Q_DATE_VALUES}[{index}].start")
}

fn end_query(index: usize) -> String {
    format!("{Q_DATE_VALUES}[{index}].end")
}

/// Number of observations in the response.
///
/// The observation count of the default series and the number of date
/// values must agree; a mismatch means the response layout has drifted.
pub fn count_observations(doc: &Value) -> Result<usize, MpError> {
    let rates = query_count(doc, &format!(r#".dataSets[].series."{SERIES_KEY}".observations | length"#))?;
    let dates = query_count(doc, &format!("{Q_DATE_VALUES} | length"))?;
    if rates != dates {
        return Err(MpError::Decode(format!(
            "the number of FX rates ({rates}) does not match the number of dates ({dates})"
        )));
    }
    Ok(rates)
}

/// Extract the observation at `index`. `flow_ref` prefixes the record key.
pub fn parse_observation(doc: &Value, index: usize, flow_ref: &str) -> Result<EcbRecord, QueryError> {
    let freq = query_str(doc, Q_FREQ)?;
    let currency = query_str(doc, Q_CURRENCY)?;
    let currency_denom = query_str(doc, Q_CURRENCY_DENOM)?;
    let exr_type = query_str(doc, Q_EXR_TYPE)?;
    let exr_suffix = query_str(doc, Q_EXR_SUFFIX)?;

    Ok(EcbRecord {
        key: format!("{flow_ref}.{freq}.{currency}.{currency_denom}.{exr_type}.{exr_suffix}"),
        sender: query_str(doc, Q_SENDER)?,
        obs_value: query_f64(doc, &rate_query(index))?,
        start_time_period: query_str(doc, &start_query(index))?,
        end_time_period: query_str(doc, &end_query(index))?,
        time_format: query_str(doc, Q_TIME_FORMAT)?,
        obs_status: query_str(doc, Q_OBS_STATUS)?,
        freq,
        currency,
        currency_denom,
        exr_type,
        exr_suffix,
    })
}

/// Decode a full response body into observations, in index order.
///
/// The [`NO_RESULTS`] body decodes to an empty list. Any failure rejects the
/// whole response; no partial list is returned.
pub fn decode_response(body: &str, flow_ref: &str) -> Result<Vec<PriceObservation>, MpError> {
    if is_no_results(body) {
        return Ok(Vec::new());
    }

    let doc: Value = serde_json::from_str(body).map_err(|e| MpError::Decode(format!("invalid JSON response: {e}")))?;
    let count = count_observations(&doc)?;

    (0..count)
        .map(|i| {
            let record = parse_observation(&doc, i, flow_ref)?;
            let payload = serde_json::to_string(&record).map_err(|e| MpError::Decode(e.to_string()))?;
            Ok(PriceObservation::new(record.key, payload))
        })
        .collect()
}

/// Whether `body` is the service's empty-result sentinel.
pub fn is_no_results(body: &str) -> bool {
    body.trim() == NO_RESULTS
}
