//! Weather ingestion.
//!
//! [`ObservationIngester::ingest_once`] pulls the latest station reading and
//! writes it as one record. Unlike partition reads, a bad upstream response
//! is a hard stop: nothing is written and the caller gets an [`IngestError`].
//!
//! [`run_schedule`] repeats ingestion on a cron schedule until shutdown.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::observation::{Observation, RecordKey};
use crate::store::{RecordStore, StoreError};
use crate::timestamp::normalize_to_millis;
use crate::weather::{StationData, WeatherError, WeatherSource};

/// Errors from one ingestion run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Weather API error: {0}")]
    Upstream(#[from] WeatherError),

    #[error("Weather response contained no values")]
    EmptyPayload,

    #[error("Malformed weather response: {0}")]
    Malformed(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid cron expression: {0}")]
    Schedule(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub key: RecordKey,
    pub observation: Observation,
}

/// Fetches station data and persists it under the weather partition.
#[derive(Clone)]
pub struct ObservationIngester {
    source: Arc<dyn WeatherSource>,
    records: RecordStore,
    partition: String,
}

impl ObservationIngester {
    pub fn new(
        source: Arc<dyn WeatherSource>,
        records: RecordStore,
        partition: impl Into<String>,
    ) -> Self {
        Self {
            source,
            records,
            partition: partition.into(),
        }
    }

    /// Fetch, validate, and write exactly one observation.
    ///
    /// Re-running against the same upstream reading rewrites the same key
    /// with the same body.
    pub async fn ingest_once(&self) -> Result<IngestReport> {
        let data = self.source.latest().await?;
        let (station_key, observation) = to_observation(data)?;
        let key = RecordKey::for_source(&self.partition, &station_key, observation.timestamp);

        self.records.put_observation(&key, &observation).await?;
        log::info!(
            "Stored {} at {} ({:.1} °C)",
            observation.device_id,
            key,
            observation.temperature
        );

        Ok(IngestReport { key, observation })
    }
}

/// Validate a station payload and build the record to store.
///
/// Returns the station key alongside the observation.
pub fn to_observation(data: StationData) -> Result<(String, Observation)> {
    let sample = data
        .value
        .and_then(|values| values.into_iter().next())
        .ok_or(IngestError::EmptyPayload)?;
    let station = data
        .station
        .ok_or_else(|| IngestError::Malformed("missing station".to_string()))?;
    if station.key.is_empty() || station.key.contains('/') || station.key.contains("..") {
        return Err(IngestError::Malformed(format!(
            "invalid station key {:?}",
            station.key
        )));
    }

    let temperature = parse_temperature(&sample.value)?;
    let observation = Observation {
        device_id: format!("SMHI-{}", station.key),
        temperature,
        humidity: None,
        timestamp: normalize_to_millis(sample.date),
        location: Some(station.name),
    };
    Ok((station.key, observation))
}

/// SMHI sends the reading as a decimal string; plain numbers are accepted too.
fn parse_temperature(value: &serde_json::Value) -> Result<f64> {
    let parsed = match value {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed
        .filter(|t| t.is_finite())
        .ok_or_else(|| IngestError::Malformed(format!("unusable temperature {}", value)))
}

// ── Scheduling ──────────────────────────────────────────────────────

/// Compute the next cron occurrence after the given epoch seconds.
///
/// Standard 5-field expressions get a leading "0 " so the seconds field is
/// pinned to zero; the `cron` crate expects 6 fields.
pub fn next_run_after(cron_expr: &str, after_epoch_secs: i64) -> Result<i64> {
    let expr = normalize_cron_expr(cron_expr);
    let schedule = cron::Schedule::from_str(&expr)
        .map_err(|e| IngestError::Schedule(format!("{}: {}", cron_expr, e)))?;

    let after = chrono::DateTime::from_timestamp(after_epoch_secs, 0).ok_or_else(|| {
        IngestError::Schedule(format!("invalid epoch seconds: {}", after_epoch_secs))
    })?;

    schedule
        .after(&after)
        .next()
        .map(|next| next.timestamp())
        .ok_or_else(|| IngestError::Schedule(format!("{}: no next occurrence", cron_expr)))
}

fn normalize_cron_expr(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Run ingestion on every occurrence of `cron_expr` until shutdown.
///
/// A failed run is logged and the loop waits for the next occurrence; there
/// are no retries in between. Returns an error only if the expression is
/// invalid.
pub async fn run_schedule(
    ingester: ObservationIngester,
    cron_expr: String,
    mut shutdown: watch::Receiver<()>,
) -> Result<()> {
    // Reject a bad expression before entering the loop.
    next_run_after(&cron_expr, chrono::Utc::now().timestamp())?;
    log::info!("[Ingest] scheduled with '{}'", cron_expr);

    loop {
        let now = chrono::Utc::now().timestamp();
        let next = next_run_after(&cron_expr, now)?;
        let wait = Duration::from_secs(next.saturating_sub(now).max(0) as u64);
        log::debug!("[Ingest] next run in {:?}", wait);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                if let Err(e) = ingester.ingest_once().await {
                    log::error!("[Ingest] scheduled run failed: {}", e);
                }
            }
            _ = shutdown.changed() => {
                log::info!("[Ingest] shutdown signal received, exiting");
                break;
            }
        }
    }
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod stub {
    use super::*;
    use crate::weather::{SampleValue, StationInfo};
    use async_trait::async_trait;

    /// Weather source returning a canned response or a canned API error.
    pub struct StubSource {
        response: Option<StationData>,
        fail_status: Option<u16>,
    }

    impl StubSource {
        pub fn with(data: StationData) -> Self {
            Self {
                response: Some(data),
                fail_status: None,
            }
        }

        pub fn failing(status: u16) -> Self {
            Self {
                response: None,
                fail_status: Some(status),
            }
        }
    }

    pub fn station_data(date: i64, value: serde_json::Value) -> StationData {
        StationData {
            value: Some(vec![SampleValue {
                date,
                value,
                quality: Some("G".into()),
            }]),
            station: Some(StationInfo {
                key: "72420".into(),
                name: "Göteborg A".into(),
            }),
        }
    }

    #[async_trait]
    impl WeatherSource for StubSource {
        async fn latest(&self) -> std::result::Result<StationData, WeatherError> {
            if let Some(status) = self.fail_status {
                return Err(WeatherError::Api {
                    status,
                    message: "unavailable".into(),
                });
            }
            Ok(self.response.clone().unwrap_or_default())
        }

        fn describe(&self) -> String {
            "stub".into()
        }
    }
}
