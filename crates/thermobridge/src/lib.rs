//! Thermobridge
//!
//! Collects temperature samples from IoT devices and from the SMHI open data
//! API into an object store, and serves comparison views over HTTP.
//!
//! # Architecture
//!
//! ```text
//! SMHI API ──► ObservationIngester ──┐
//!                                    ├──► RecordStore ──► ObjectStore (memory / fs / s3)
//! MQTT ──────► IotRecorder ──────────┘         │
//!                                              ▼
//!                  gateway ◄── aggregate (latest / compare / combine)
//! ```
//!
//! # Modules
//!
//! - [`timestamp`]: seconds/milliseconds normalization.
//! - [`observation`]: stored record and derived row types.
//! - [`store`]: object store backends and the best-effort `RecordStore`.
//! - [`aggregate`]: latest selection, broadcast comparison, positional zip.
//! - [`weather`]: SMHI client.
//! - [`ingest`]: one-shot and scheduled weather ingestion.
//! - [`iot`]: MQTT recorder for device samples.
//! - [`gateway`]: axum routes.
//! - [`config`]: YAML configuration with environment overrides.

pub mod aggregate;
pub mod config;
pub mod gateway;
pub mod ingest;
pub mod iot;
pub mod observation;
pub mod store;
pub mod timestamp;
pub mod weather;

pub use observation::{CombinedRow, ComparisonRow, Observation, RecordKey};
pub use store::{Collected, RecordStore};
