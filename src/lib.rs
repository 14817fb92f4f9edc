//! KEBA Wallbox Monitor Library
//!
//! This library polls a KEBA KeContact P30 wallbox over UDP, derives the charging
//! state and output level from its status and power reports, and publishes them both
//! to a live bridge accessory and to a Prometheus scrape endpoint.

pub mod accessory;
pub mod config;
pub mod error;
pub mod keba_report;
pub mod metrics_deriver;
pub mod prometheus_exporter;
pub mod state_store;
pub mod wallbox_client;
pub mod wallbox_coordinator;

// Re-export commonly used types for easier access
pub use accessory::{AccessoryInfo, Characteristic, CharacteristicSink, FanAccessory};
pub use config::MonitorConfig;
pub use keba_report::{decode_datagram, ReportRecord};
pub use metrics_deriver::MetricsDeriver;
pub use state_store::{DeviceState, StateStore};
pub use wallbox_coordinator::WallboxCoordinator;
