// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Data Models
//!
//! Core data structures flowing through the analysis pipeline: the raw activity
//! (location track plus sensor streams), the derived interval efforts and the
//! summary handed to external storage.
//!
//! ## Core Models
//!
//! - [`Activity`]: one recorded session with its raw samples
//! - [`LocationSample`]: a single GPS fix
//! - [`SensorSample`] / [`AccelerometerSample`]: sensor readings
//! - [`IntervalEffort`]: a detected high-effort segment
//! - [`AnalysisSummary`]: result key to value mapping

use crate::config::AnalysisConfig;
use crate::errors::{AnalysisError, AnalysisResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Kind of activity, used to pick speed windows, record distances and cadence scaling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Running,
    Cycling,
    Walking,
    Hiking,
    Swimming,
    /// Any activity type without dedicated handling
    Unspecified(String),
}

impl ActivityType {
    /// Create ActivityType from a raw string using the configured mapping
    pub fn from_raw(raw: &str, config: &AnalysisConfig) -> Self {
        if let Some(internal_name) = config.map_activity_type(raw) {
            return Self::from_internal_string(internal_name);
        }
        Self::from_internal_string(&raw.to_lowercase())
    }

    /// Create ActivityType from an internal configuration string
    pub fn from_internal_string(internal_name: &str) -> Self {
        match internal_name {
            "running" | "run" => ActivityType::Running,
            "cycling" | "ride" | "bike_ride" => ActivityType::Cycling,
            "walking" | "walk" => ActivityType::Walking,
            "hiking" | "hike" => ActivityType::Hiking,
            "swimming" | "swim" => ActivityType::Swimming,
            other => ActivityType::Unspecified(other.to_string()),
        }
    }

    pub fn is_cycling(&self) -> bool {
        matches!(self, ActivityType::Cycling)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ActivityType::Running)
    }

    /// Activities where cadence sensors count a single foot
    pub fn is_foot_based(&self) -> bool {
        matches!(
            self,
            ActivityType::Running | ActivityType::Walking | ActivityType::Hiking
        )
    }
}

impl Default for ActivityType {
    fn default() -> Self {
        ActivityType::Unspecified("unspecified".to_string())
    }
}

/// A single GPS fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Milliseconds since the Unix epoch
    #[serde(alias = "time")]
    pub timestamp_ms: u64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
    /// Horizontal accuracy in meters, when the device reports it
    #[serde(default)]
    pub horizontal_accuracy: Option<f64>,
    #[serde(default)]
    pub vertical_accuracy: Option<f64>,
}

impl LocationSample {
    pub fn new(timestamp_ms: u64, latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            timestamp_ms,
            latitude,
            longitude,
            altitude,
            horizontal_accuracy: None,
            vertical_accuracy: None,
        }
    }

    pub fn with_accuracy(mut self, horizontal: Option<f64>, vertical: Option<f64>) -> Self {
        self.horizontal_accuracy = horizontal;
        self.vertical_accuracy = vertical;
        self
    }
}

/// A scalar sensor reading (heart rate, power, cadence)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub timestamp_ms: u64,
    pub value: f64,
}

/// A three axis accelerometer reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelerometerSample {
    pub timestamp_ms: u64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelerometerSample {
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Sensor stream types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Accelerometer,
    Cadence,
    HeartRate,
    Power,
}

impl SensorType {
    /// Every sensor type with an analyzer, in analysis order
    pub const ALL: [SensorType; 4] = [
        SensorType::Accelerometer,
        SensorType::Cadence,
        SensorType::HeartRate,
        SensorType::Power,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Accelerometer => "accelerometer",
            SensorType::Cadence => "cadence",
            SensorType::HeartRate => "heart_rate",
            SensorType::Power => "power",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorType::HeartRate => write!(f, "heart rate"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// All sensor streams of one activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    #[serde(default)]
    pub accelerometer: Vec<AccelerometerSample>,
    #[serde(default)]
    pub heart_rate: Vec<SensorSample>,
    #[serde(default)]
    pub cadence: Vec<SensorSample>,
    #[serde(default)]
    pub power: Vec<SensorSample>,
}

impl SensorData {
    /// Scalar samples for a sensor type; accelerometer data is not scalar
    pub fn scalar(&self, sensor_type: SensorType) -> Option<&[SensorSample]> {
        match sensor_type {
            SensorType::HeartRate => Some(&self.heart_rate),
            SensorType::Cadence => Some(&self.cadence),
            SensorType::Power => Some(&self.power),
            SensorType::Accelerometer => None,
        }
    }

    pub fn is_present(&self, sensor_type: SensorType) -> bool {
        match sensor_type {
            SensorType::Accelerometer => !self.accelerometer.is_empty(),
            other => self.scalar(other).is_some_and(|s| !s.is_empty()),
        }
    }

    /// Latest timestamp across all streams
    pub fn last_timestamp_ms(&self) -> Option<u64> {
        let accel = self.accelerometer.last().map(|s| s.timestamp_ms);
        [&self.heart_rate, &self.cadence, &self.power]
            .iter()
            .filter_map(|stream| stream.last().map(|s| s.timestamp_ms))
            .chain(accel)
            .max()
    }
}

/// One recorded exercise session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub activity_type: ActivityType,
    /// Start time in Unix seconds
    pub start_time: Option<i64>,
    #[serde(default)]
    pub locations: Vec<LocationSample>,
    #[serde(default)]
    pub sensors: SensorData,
}

impl Activity {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, activity_type: ActivityType) -> Self {
        Self {
            id: Some(id.into()),
            user_id: Some(user_id.into()),
            activity_type,
            ..Default::default()
        }
    }

    /// The owning user, needed by every per-user pipeline step
    pub fn require_user_id(&self) -> AnalysisResult<&str> {
        self.user_id
            .as_deref()
            .ok_or_else(|| AnalysisError::MissingPrecondition("activity has no user ID".to_string()))
    }

    /// Earliest sample timestamp in milliseconds
    pub fn first_timestamp_ms(&self) -> Option<u64> {
        let sensors = [
            self.sensors.heart_rate.first().map(|s| s.timestamp_ms),
            self.sensors.cadence.first().map(|s| s.timestamp_ms),
            self.sensors.power.first().map(|s| s.timestamp_ms),
            self.sensors.accelerometer.first().map(|s| s.timestamp_ms),
        ];
        self.locations
            .first()
            .map(|l| l.timestamp_ms)
            .into_iter()
            .chain(sensors.into_iter().flatten())
            .min()
    }

    /// Latest sample timestamp in milliseconds
    pub fn last_timestamp_ms(&self) -> Option<u64> {
        let location = self.locations.last().map(|l| l.timestamp_ms);
        location
            .into_iter()
            .chain(self.sensors.last_timestamp_ms())
            .max()
    }
}

/// One point of the current speed graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedPoint {
    pub timestamp_ms: u64,
    pub speed: f64,
}

/// A contiguous span of significantly elevated pace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalEffort {
    pub start_time_ms: u64,
    pub end_time_ms: u64,
    pub duration_s: f64,
    pub length_m: f64,
    /// Mean of the unsmoothed speed graph over the span (m/s)
    pub avg_speed: f64,
}

/// Result key to value mapping handed to external storage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisSummary {
    values: BTreeMap<String, Value>,
}

impl AnalysisSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Insert any serializable value; serialization failures are logged and skipped
    pub fn insert_serialized<T: Serialize>(&mut self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(v) => {
                self.values.insert(key.to_string(), v);
            }
            Err(e) => warn!(summary.key = %key, "Failed to serialize summary value: {}", e),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Merge another summary into this one; keys in `other` win
    pub fn merge(&mut self, other: AnalysisSummary) {
        self.values.extend(other.values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone().into_iter().collect())
    }
}

/// Status of the deferred task tracking one analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeferredTaskStatus {
    Started,
    Finished,
    Failed,
}

impl fmt::Display for DeferredTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferredTaskStatus::Started => write!(f, "STARTED"),
            DeferredTaskStatus::Finished => write!(f, "FINISHED"),
            DeferredTaskStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Wire shape of a serialized activity; streams are decoded one reading at a time
#[derive(Debug, Deserialize)]
struct ActivityPayload {
    #[serde(default, alias = "activity_id")]
    id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    activity_type: Option<String>,
    #[serde(default)]
    start_time: Option<i64>,
    #[serde(default)]
    locations: Vec<Value>,
    #[serde(default)]
    heart_rate: Vec<Value>,
    #[serde(default)]
    cadence: Vec<Value>,
    #[serde(default)]
    power: Vec<Value>,
    #[serde(default)]
    accelerometer: Vec<Value>,
}

/// Decode a serialized activity. Malformed readings are dropped individually.
pub fn parse_activity_payload(json: &str, config: &AnalysisConfig) -> AnalysisResult<Activity> {
    let payload: ActivityPayload = serde_json::from_str(json)?;

    let locations = payload
        .locations
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<LocationSample>(v) {
            Ok(location) => Some(location),
            Err(e) => {
                warn!("Dropping malformed location: {}", e);
                None
            }
        })
        .collect();

    let sensors = SensorData {
        accelerometer: keep_valid(payload.accelerometer, SensorType::Accelerometer, parse_accelerometer_reading),
        heart_rate: keep_valid(payload.heart_rate, SensorType::HeartRate, parse_scalar_reading),
        cadence: keep_valid(payload.cadence, SensorType::Cadence, parse_scalar_reading),
        power: keep_valid(payload.power, SensorType::Power, parse_scalar_reading),
    };

    Ok(Activity {
        id: payload.id,
        user_id: payload.user_id,
        activity_type: payload
            .activity_type
            .map(|raw| ActivityType::from_raw(&raw, config))
            .unwrap_or_default(),
        start_time: payload.start_time,
        locations,
        sensors,
    })
}

fn keep_valid<T>(
    readings: Vec<Value>,
    sensor_type: SensorType,
    parse: fn(&Value) -> AnalysisResult<T>,
) -> Vec<T> {
    readings
        .iter()
        .filter_map(|reading| match parse(reading) {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!(sensor.type = %sensor_type, "Dropping reading: {}", e);
                None
            }
        })
        .collect()
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite())
}

fn timestamp(value: &Value) -> Option<u64> {
    number(value).filter(|t| *t >= 0.0).map(|t| t.trunc() as u64)
}

/// Accepts `{"time": t, "value": v}` or a single entry map `{"<t>": v}`
pub fn parse_scalar_reading(reading: &Value) -> AnalysisResult<SensorSample> {
    let obj = reading
        .as_object()
        .ok_or_else(|| AnalysisError::MalformedSample(format!("expected an object, got {reading}")))?;

    if let (Some(t), Some(v)) = (obj.get("time").or_else(|| obj.get("timestamp_ms")), obj.get("value")) {
        let timestamp_ms = timestamp(t)
            .ok_or_else(|| AnalysisError::MalformedSample(format!("invalid time {t}")))?;
        let value = number(v).ok_or_else(|| AnalysisError::MalformedSample(format!("invalid value {v}")))?;
        return Ok(SensorSample { timestamp_ms, value });
    }

    match obj.iter().next() {
        Some((t, v)) if obj.len() == 1 => {
            let timestamp_ms = timestamp(&Value::String(t.clone()))
                .ok_or_else(|| AnalysisError::MalformedSample(format!("invalid time {t}")))?;
            let value = number(v).ok_or_else(|| AnalysisError::MalformedSample(format!("invalid value {v}")))?;
            Ok(SensorSample { timestamp_ms, value })
        }
        _ => Err(AnalysisError::MalformedSample(format!("unrecognized reading {reading}"))),
    }
}

/// Accepts `{"time": t, "x": .., "y": .., "z": ..}`
pub fn parse_accelerometer_reading(reading: &Value) -> AnalysisResult<AccelerometerSample> {
    let field = |name: &str| reading.get(name).and_then(number);
    let timestamp_ms = reading
        .get("time")
        .or_else(|| reading.get("timestamp_ms"))
        .and_then(timestamp);
    match (timestamp_ms, field("x"), field("y"), field("z")) {
        (Some(timestamp_ms), Some(x), Some(y), Some(z)) => Ok(AccelerometerSample { timestamp_ms, x, y, z }),
        _ => Err(AnalysisError::MalformedSample(format!(
            "incomplete accelerometer reading {reading}"
        ))),
    }
}
