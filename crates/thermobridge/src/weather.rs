//! SMHI open data client.
//!
//! Fetches the latest-hour air temperature for one station from the
//! metobs API. The payload is only decoded here; validation belongs to
//! [`crate::ingest`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default metobs API root.
pub const DEFAULT_BASE_URL: &str = "https://opendata-download-metobs.smhi.se/api/version/latest";

/// Errors from the weather API.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WeatherError>;

/// Station data response. Fields the ingester does not use are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationData {
    #[serde(default)]
    pub value: Option<Vec<SampleValue>>,
    #[serde(default)]
    pub station: Option<StationInfo>,
}

/// One reading. `value` is a decimal string in practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleValue {
    /// Milliseconds since epoch.
    pub date: i64,
    pub value: serde_json::Value,
    #[serde(default)]
    pub quality: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationInfo {
    pub key: String,
    pub name: String,
}

/// Where the latest station data comes from.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn latest(&self) -> Result<StationData>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Station, parameter and endpoint selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    pub station: String,
    /// Metobs parameter id; 1 is hourly air temperature.
    pub parameter: u32,
    pub period: String,
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            station: "72420".to_string(),
            parameter: 1,
            period: "latest-hour".to_string(),
            timeout_secs: 10,
        }
    }
}

impl WeatherConfig {
    pub fn data_url(&self) -> String {
        format!(
            "{}/parameter/{}/station/{}/period/{}/data.json",
            self.base_url.trim_end_matches('/'),
            self.parameter,
            self.station,
            self.period
        )
    }
}

/// reqwest-backed [`WeatherSource`].
#[derive(Debug, Clone)]
pub struct SmhiClient {
    client: reqwest::Client,
    url: String,
}

impl SmhiClient {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.data_url(),
        })
    }
}

#[async_trait]
impl WeatherSource for SmhiClient {
    async fn latest(&self) -> Result<StationData> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(WeatherError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    /// Serve `app` on an ephemeral port and point a client at it.
    async fn client_for(app: Router) -> SmhiClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let config = WeatherConfig {
            base_url: format!("http://{}", addr),
            ..Default::default()
        };
        SmhiClient::new(&config).unwrap()
    }

    const DATA_PATH: &str = "/parameter/1/station/72420/period/latest-hour/data.json";

    #[tokio::test]
    async fn test_latest_decodes_payload() {
        let app = Router::new().route(
            DATA_PATH,
            get(|| async {
                r#"{"value":[{"date":1700000000000,"value":"4.5"}],"station":{"key":"72420","name":"A"}}"#
            }),
        );
        let data = client_for(app).await.latest().await.unwrap();
        assert_eq!(data.value.unwrap()[0].value, serde_json::json!("4.5"));
        assert_eq!(data.station.unwrap().key, "72420");
    }

    #[tokio::test]
    async fn test_latest_non_success_is_api_error() {
        let app = Router::new().route(
            DATA_PATH,
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        );
        match client_for(app).await.latest().await {
            Err(WeatherError::Api { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_latest_invalid_body_is_decode_error() {
        let app = Router::new().route(DATA_PATH, get(|| async { "<html>not json</html>" }));
        assert!(matches!(
            client_for(app).await.latest().await,
            Err(WeatherError::Decode(_))
        ));
    }

    #[test]
    fn test_default_url() {
        assert_eq!(
            WeatherConfig::default().data_url(),
            "https://opendata-download-metobs.smhi.se/api/version/latest/parameter/1/station/72420/period/latest-hour/data.json"
        );
    }

    #[test]
    fn test_url_trailing_slash() {
        let config = WeatherConfig {
            base_url: "http://localhost:9000/".into(),
            station: "98210".into(),
            ..Default::default()
        };
        assert_eq!(
            config.data_url(),
            "http://localhost:9000/parameter/1/station/98210/period/latest-hour/data.json"
        );
    }

    #[test]
    fn test_parse_station_payload() {
        let json = r#"{
            "value": [{"date": 1700000000000, "value": "4.5", "quality": "G"}],
            "updated": 1700000100000,
            "parameter": {"key": "1", "name": "Lufttemperatur", "unit": "degree celsius"},
            "station": {"key": "72420", "name": "Göteborg A", "owner": "SMHI", "height": 3.0},
            "period": {"key": "latest-hour"}
        }"#;
        let data: StationData = serde_json::from_str(json).unwrap();
        let values = data.value.unwrap();
        assert_eq!(values[0].date, 1_700_000_000_000);
        assert_eq!(values[0].value, serde_json::json!("4.5"));
        assert_eq!(values[0].quality.as_deref(), Some("G"));
        assert_eq!(data.station.unwrap().key, "72420");
    }

    #[test]
    fn test_parse_payload_without_values() {
        let data: StationData = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert!(data.value.is_none());
        assert!(data.station.is_none());
    }
}
