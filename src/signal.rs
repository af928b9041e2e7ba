//! # Signal Data Model
//!
//! The inbound sensor report schema and its reduced wire projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped sensor report about a tracked object.
///
/// Identity is `(sn, ts)` and is not unique: a sensor may report duplicate
/// timestamps and they are stored as-is, not deduplicated. Producers may use
/// either the transmitter field names (`SN`, `Latitude`, ...) or the
/// snake_case column names; both deserialize to the same struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Report timestamp; defaults to ingestion wall-clock when omitted
    #[serde(default = "Utc::now")]
    pub ts: DateTime<Utc>,

    /// Sensor serial number
    #[serde(alias = "SN")]
    pub sn: String,

    /// UAS identifier, when the transmitter includes one
    #[serde(default, alias = "UASID")]
    pub uasid: Option<String>,

    /// Drone type label
    #[serde(default, alias = "DroneType")]
    pub drone_type: Option<String>,

    /// Heading in degrees (0-359)
    #[serde(default, alias = "Direction")]
    pub direction_deg: Option<i32>,

    /// Horizontal speed in m/s
    #[serde(default, alias = "SpeedHorizontal")]
    pub speed_h_mps: Option<f64>,

    /// Vertical speed in m/s (negative means descending)
    #[serde(default, alias = "SpeedVertical")]
    pub speed_v_mps: Option<f64>,

    /// Latitude; `None` means no position fix
    #[serde(default, alias = "Latitude")]
    pub lat: Option<f64>,

    /// Longitude; `None` means no position fix
    #[serde(default, alias = "Longitude")]
    pub lon: Option<f64>,

    /// Height above ground in meters
    #[serde(default, alias = "Height")]
    pub height_m: Option<f64>,

    /// Operator position latitude
    #[serde(default, alias = "OperatorLatitude")]
    pub operator_lat: Option<f64>,

    /// Operator position longitude
    #[serde(default, alias = "OperatorLongitude")]
    pub operator_lon: Option<f64>,
}

/// Reduced projection of a [`Signal`] pushed to realtime subscribers.
///
/// This is the wire payload, intentionally smaller than the stored row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastMessage {
    pub sn: String,
    pub ts: DateTime<Utc>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub height_m: Option<f64>,
    pub speed_h_mps: Option<f64>,
    pub direction_deg: Option<i32>,
}

impl From<&Signal> for BroadcastMessage {
    fn from(signal: &Signal) -> Self {
        Self {
            sn: signal.sn.clone(),
            ts: signal.ts,
            lat: signal.lat,
            lon: signal.lon,
            height_m: signal.height_m,
            speed_h_mps: signal.speed_h_mps,
            direction_deg: signal.direction_deg,
        }
    }
}
