//! Data model for pipeline readings and batches.
//!
//! A [`Reading`] is one traffic observation; a [`Batch`] is the ordered set
//! of readings produced by one scheduler tick. Enrichment attaches a
//! predicted speed to every reading, yielding an [`EnrichedBatch`] that the
//! sink serializes as a flat JSON array of row objects.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One traffic observation.
///
/// `hour` is always within `0..=23`; simulated sources wrap jittered values
/// back into that range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Hour of day, 0-23
    pub hour: u8,
}

impl Reading {
    /// Create a new reading.
    pub fn new(latitude: f64, longitude: f64, hour: u8) -> Self {
        Self {
            latitude,
            longitude,
            hour,
        }
    }
}

/// Where an enriched row's predicted speed came from.
///
/// Process-local metadata only; it is never serialized, so rows parsed back
/// from a wire payload default to `Model`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredictionOrigin {
    /// The model-serving endpoint returned a genuine prediction
    #[default]
    Model,

    /// The prediction call failed and the fallback constant was recorded
    Fallback,
}

/// A reading with its predicted speed attached.
///
/// Serializes flat: `{latitude, longitude, hour, predicted_speed}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedReading {
    /// The original observation
    #[serde(flatten)]
    pub reading: Reading,

    /// Predicted traffic speed in km/h (model output or fallback)
    pub predicted_speed: f64,

    /// Whether the speed is a genuine prediction or a fallback
    #[serde(skip)]
    pub origin: PredictionOrigin,
}

impl EnrichedReading {
    /// Attach a genuine model prediction to a reading.
    pub fn predicted(reading: Reading, speed_kmh: f64) -> Self {
        Self {
            reading,
            predicted_speed: speed_kmh,
            origin: PredictionOrigin::Model,
        }
    }

    /// Attach a fallback value after a failed prediction call.
    pub fn fallback(reading: Reading, speed_kmh: f64) -> Self {
        Self {
            reading,
            predicted_speed: speed_kmh,
            origin: PredictionOrigin::Fallback,
        }
    }

    /// Whether this row carries a fallback value rather than a prediction.
    pub fn is_fallback(&self) -> bool {
        self.origin == PredictionOrigin::Fallback
    }
}

/// An ordered batch of readings produced by one scheduler tick.
///
/// Row order is fetch order and is preserved through enrichment. The
/// `tick_id` exists purely to correlate log lines belonging to one tick; it
/// is never sent over the wire.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Correlation id for log lines of the tick that produced this batch
    pub tick_id: Uuid,

    readings: Vec<Reading>,
}

impl Batch {
    /// Create a new batch from readings in fetch order.
    pub fn new(readings: Vec<Reading>) -> Self {
        Self {
            tick_id: Uuid::new_v4(),
            readings,
        }
    }

    /// Create an empty batch.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Get the number of readings in the batch.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Readings in fetch order.
    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }
}

/// A batch whose readings all carry a predicted speed.
#[derive(Debug, Clone)]
pub struct EnrichedBatch {
    /// Correlation id inherited from the source [`Batch`]
    pub tick_id: Uuid,

    rows: Vec<EnrichedReading>,
}

impl EnrichedBatch {
    /// Create an enriched batch, keeping the originating tick id.
    pub fn new(tick_id: Uuid, rows: Vec<EnrichedReading>) -> Self {
        Self { tick_id, rows }
    }

    /// Get the number of rows in the batch.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in the original fetch order.
    pub fn rows(&self) -> &[EnrichedReading] {
        &self.rows
    }

    /// How many rows carry a fallback value instead of a model prediction.
    pub fn fallback_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_fallback()).count()
    }
}

/// One hourly temperature row from the weather source.
///
/// `hour` is the index into the hourly series, not a clock hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    /// Index of the entry within the hourly series
    pub hour: u8,

    /// Air temperature at two meters, in degrees Celsius
    pub temperature_celsius: f64,
}

/// One simulated pollution row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutionReading {
    /// Pollutant name, e.g. "PM2.5"
    pub pollutant: String,

    /// Measured concentration
    pub value: f64,

    /// Concentration unit
    pub unit: String,
}

/// Request body for the model-serving prediction endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub hour: u8,
}

impl From<&Reading> for PredictRequest {
    fn from(reading: &Reading) -> Self {
        Self {
            latitude: reading.latitude,
            longitude: reading.longitude,
            hour: reading.hour,
        }
    }
}

/// Response body from the model-serving prediction endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predicted_speed: f64,
}
