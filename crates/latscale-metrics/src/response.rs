//! Prometheus `/api/v1/query` response decoding.

use serde::Deserialize;

use crate::error::{MetricsError, MetricsResult};

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(rename = "errorType", default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VectorEntry {
    /// `[<unix timestamp>, "<sample value>"]`
    value: (f64, String),
}

/// Extract the numeric value of the first result entry.
///
/// Instant vectors and scalars are accepted. The value is parsed as a
/// float, so `"NaN"` and `"+Inf"` come back as-is for the caller to judge.
pub fn parse_value(body: &[u8]) -> MetricsResult<f64> {
    let response: QueryResponse = serde_json::from_slice(body)?;

    if response.status != "success" {
        return Err(MetricsError::QueryFailed {
            error_type: response.error_type.unwrap_or_else(|| response.status.clone()),
            message: response.error.unwrap_or_default(),
        });
    }

    let data = response.data.ok_or(MetricsError::EmptyResult)?;
    let raw = match data.result_type.as_str() {
        "vector" => {
            let entries: Vec<VectorEntry> = serde_json::from_value(data.result)?;
            entries
                .into_iter()
                .next()
                .ok_or(MetricsError::EmptyResult)?
                .value
                .1
        }
        "scalar" => {
            let (_, value): (f64, String) = serde_json::from_value(data.result)?;
            value
        }
        other => return Err(MetricsError::ResultType(other.to_string())),
    };

    raw.trim()
        .parse::<f64>()
        .map_err(|_| MetricsError::InvalidValue(raw))
}
