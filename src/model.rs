//! Linear traffic speed model: training, artifact persistence, inference.
//!
//! The model is an ordinary least squares fit of speed against latitude,
//! longitude, and hour of day, persisted as a small JSON artifact. Training
//! data is synthesized the same way the simulated traffic feed produces
//! readings, with speeds drawn from a normal distribution.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local, Timelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sources::{BASE_LATITUDE, BASE_LONGITUDE, COORDINATE_SPREAD};

/// Feature columns of the model, in weight order.
pub const MODEL_FEATURES: [&str; 3] = ["latitude", "longitude", "hour"];

/// Mean of the synthetic speed distribution, in km/h.
const SPEED_MEAN_KMH: f64 = 30.0;

/// Standard deviation of the synthetic speed distribution, in km/h.
const SPEED_STDDEV_KMH: f64 = 8.0;

/// Relative pivot threshold below which the normal equations are treated as
/// singular.
const SINGULAR_EPSILON: f64 = 1e-11;

/// Errors from model training and artifact handling.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model artifact {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("model artifact is invalid: {0}")]
    Invalid(String),

    #[error("training data is degenerate: {0}")]
    Degenerate(String),
}

/// A trained linear model over `[latitude, longitude, hour]`.
///
/// The struct doubles as the on-disk artifact; [`TrafficModel::save`] and
/// [`TrafficModel::load`] move it through JSON unchanged. Inference never
/// fails: a model can only be obtained from a successful fit or a validated
/// artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficModel {
    weights: Vec<f64>,
    intercept: f64,
    feature_names: Vec<String>,
    trained_at: DateTime<Utc>,
}

impl TrafficModel {
    /// Fit the model on synthetic data in the shape of the simulated traffic
    /// feed: coordinates inside the sensor grid, hours taken from a
    /// minute-spaced series ending now, speeds normally distributed.
    pub fn train_synthetic(rows: usize) -> Result<Self, ModelError> {
        if rows <= MODEL_FEATURES.len() {
            return Err(ModelError::Degenerate(format!(
                "need more than {} training rows, got {}",
                MODEL_FEATURES.len(),
                rows
            )));
        }

        let mut rng = rand::thread_rng();
        let end = Local::now();

        let samples: Vec<([f64; 3], f64)> = (0..rows)
            .map(|i| {
                let timestamp = end - chrono::Duration::minutes((rows - 1 - i) as i64);
                let latitude = BASE_LATITUDE + rng.gen::<f64>() * COORDINATE_SPREAD;
                let longitude = BASE_LONGITUDE + rng.gen::<f64>() * COORDINATE_SPREAD;
                let hour = timestamp.hour() as f64;
                let speed = normal_sample(&mut rng, SPEED_MEAN_KMH, SPEED_STDDEV_KMH);
                ([latitude, longitude, hour], speed)
            })
            .collect();

        Self::fit(&samples)
    }

    /// Fit the model on `(features, speed)` samples by ordinary least
    /// squares.
    pub fn fit(samples: &[([f64; 3], f64)]) -> Result<Self, ModelError> {
        if samples.len() <= MODEL_FEATURES.len() {
            return Err(ModelError::Degenerate(format!(
                "need more than {} samples, got {}",
                MODEL_FEATURES.len(),
                samples.len()
            )));
        }

        // Normal equations over [1, latitude, longitude, hour].
        let mut xtx = [[0.0f64; 4]; 4];
        let mut xty = [0.0f64; 4];
        for (features, speed) in samples {
            let x = [1.0, features[0], features[1], features[2]];
            for i in 0..4 {
                xty[i] += x[i] * speed;
                for j in 0..4 {
                    xtx[i][j] += x[i] * x[j];
                }
            }
        }

        let solution = solve_4x4(xtx, xty).ok_or_else(|| {
            ModelError::Degenerate("feature columns are collinear".to_string())
        })?;

        Ok(Self {
            weights: solution[1..].to_vec(),
            intercept: solution[0],
            feature_names: MODEL_FEATURES.iter().map(|s| s.to_string()).collect(),
            trained_at: Utc::now(),
        })
    }

    /// Write the model artifact as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|e| ModelError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        fs::write(path, json).map_err(|e| ModelError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Load and validate a model artifact.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ModelError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let model: Self = serde_json::from_str(&text).map_err(|e| ModelError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.weights.len() != MODEL_FEATURES.len() {
            return Err(ModelError::Invalid(format!(
                "expected {} weights, artifact has {}",
                MODEL_FEATURES.len(),
                self.weights.len()
            )));
        }
        if self.feature_names.len() != self.weights.len() {
            return Err(ModelError::Invalid(format!(
                "{} feature names for {} weights",
                self.feature_names.len(),
                self.weights.len()
            )));
        }

        // Probe with a representative input; a corrupt artifact surfaces
        // here instead of at serving time.
        let probe = self.predict(BASE_LATITUDE, BASE_LONGITUDE, 12);
        if !probe.is_finite() {
            return Err(ModelError::Invalid(format!(
                "probe prediction is not finite: {}",
                probe
            )));
        }
        Ok(())
    }

    /// Predict the traffic speed in km/h for one set of features.
    pub fn predict(&self, latitude: f64, longitude: f64, hour: u8) -> f64 {
        self.intercept
            + self.weights[0] * latitude
            + self.weights[1] * longitude
            + self.weights[2] * hour as f64
    }

    /// Get the fitted feature weights, in [`MODEL_FEATURES`] order.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Get the fitted intercept.
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// When this model was trained.
    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }
}

/// Draw one sample from a normal distribution via the Box-Muller transform.
fn normal_sample(rng: &mut impl Rng, mean: f64, stddev: f64) -> f64 {
    // Shift the open side of the unit interval so the log argument is
    // never zero.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
    mean + stddev * z
}

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` when the system is singular relative to its magnitude.
fn solve_4x4(a: [[f64; 4]; 4], b: [f64; 4]) -> Option<[f64; 4]> {
    let mut m = [[0.0f64; 5]; 4];
    let mut scale = 0.0f64;
    for i in 0..4 {
        for j in 0..4 {
            m[i][j] = a[i][j];
            scale = scale.max(a[i][j].abs());
        }
        m[i][4] = b[i];
    }
    if scale == 0.0 {
        return None;
    }

    for col in 0..4 {
        let mut pivot = col;
        for row in (col + 1)..4 {
            if m[row][col].abs() > m[pivot][col].abs() {
                pivot = row;
            }
        }
        if m[pivot][col].abs() < scale * SINGULAR_EPSILON {
            return None;
        }
        m.swap(col, pivot);

        for row in (col + 1)..4 {
            let factor = m[row][col] / m[col][col];
            for k in col..5 {
                m[row][k] -= factor * m[col][k];
            }
        }
    }

    let mut x = [0.0f64; 4];
    for row in (0..4).rev() {
        let mut sum = m[row][4];
        for k in (row + 1)..4 {
            sum -= m[row][k] * x[k];
        }
        x[row] = sum / m[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_samples(count: usize) -> Vec<([f64; 3], f64)> {
        // speed = 10 + 1*lat + 2*lon + 0.5*hour, with feature columns that
        // are not collinear.
        (0..count)
            .map(|i| {
                let latitude = i as f64 * 0.1;
                let longitude = (i % 7) as f64 * 0.3;
                let hour = (i % 24) as f64;
                let speed = 10.0 + latitude + 2.0 * longitude + 0.5 * hour;
                ([latitude, longitude, hour], speed)
            })
            .collect()
    }

    #[test]
    fn test_fit_recovers_exact_linear_relation() {
        let model = TrafficModel::fit(&linear_samples(60)).unwrap();

        assert!((model.intercept() - 10.0).abs() < 1e-6);
        assert!((model.weights()[0] - 1.0).abs() < 1e-6);
        assert!((model.weights()[1] - 2.0).abs() < 1e-6);
        assert!((model.weights()[2] - 0.5).abs() < 1e-6);

        let predicted = model.predict(1.5, 0.9, 10);
        assert!((predicted - (10.0 + 1.5 + 1.8 + 5.0)).abs() < 1e-6);
    }

    #[test]
    fn test_fit_rejects_constant_feature() {
        // A constant latitude column is collinear with the intercept.
        let samples: Vec<([f64; 3], f64)> = (0..30)
            .map(|i| ([12.98, (i % 7) as f64 * 0.3, (i % 24) as f64], 30.0))
            .collect();

        let err = TrafficModel::fit(&samples).unwrap_err();
        assert!(matches!(err, ModelError::Degenerate(_)));
    }

    #[test]
    fn test_fit_rejects_too_few_samples() {
        let err = TrafficModel::fit(&linear_samples(3)).unwrap_err();
        assert!(matches!(err, ModelError::Degenerate(_)));

        let err = TrafficModel::train_synthetic(2).unwrap_err();
        assert!(matches!(err, ModelError::Degenerate(_)));
    }

    #[test]
    fn test_train_synthetic_predicts_plausible_speeds() {
        let model = TrafficModel::train_synthetic(1000).unwrap();

        assert_eq!(model.weights().len(), MODEL_FEATURES.len());
        let predicted = model.predict(BASE_LATITUDE + 0.01, BASE_LONGITUDE + 0.01, 12);
        assert!(
            predicted > 10.0 && predicted < 50.0,
            "prediction {} outside plausible range",
            predicted
        );

        let age = Utc::now() - model.trained_at();
        assert!(age.num_seconds() >= 0 && age.num_seconds() < 60);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic_model.json");

        let model = TrafficModel::fit(&linear_samples(60)).unwrap();
        model.save(&path).unwrap();

        let loaded = TrafficModel::load(&path).unwrap();
        assert_eq!(loaded.weights(), model.weights());
        assert_eq!(loaded.intercept(), model.intercept());
        assert_eq!(loaded.trained_at(), model.trained_at());
        assert_eq!(
            loaded.predict(1.0, 2.0, 3),
            model.predict(1.0, 2.0, 3)
        );
    }

    #[test]
    fn test_artifact_field_names() {
        let model = TrafficModel::fit(&linear_samples(60)).unwrap();
        let value = serde_json::to_value(&model).unwrap();

        let object = value.as_object().unwrap();
        assert!(object.contains_key("weights"));
        assert!(object.contains_key("intercept"));
        assert!(object.contains_key("feature_names"));
        assert!(object.contains_key("trained_at"));
        assert_eq!(
            value["feature_names"],
            serde_json::json!(["latitude", "longitude", "hour"])
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = TrafficModel::load("/nonexistent/traffic_model.json").unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }

    #[test]
    fn test_load_corrupt_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic_model.json");
        std::fs::write(&path, "not json at all").unwrap();

        let err = TrafficModel::load(&path).unwrap_err();
        assert!(matches!(err, ModelError::Parse { .. }));
    }

    #[test]
    fn test_load_rejects_wrong_weight_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic_model.json");
        let artifact = serde_json::json!({
            "weights": [1.0, 2.0],
            "intercept": 5.0,
            "feature_names": ["latitude", "longitude"],
            "trained_at": "2024-01-01T00:00:00Z"
        });
        std::fs::write(&path, artifact.to_string()).unwrap();

        let err = TrafficModel::load(&path).unwrap_err();
        assert!(matches!(err, ModelError::Invalid(_)));
    }

    #[test]
    fn test_normal_sample_distribution() {
        let mut rng = rand::thread_rng();
        let samples: Vec<f64> = (0..10_000)
            .map(|_| normal_sample(&mut rng, SPEED_MEAN_KMH, SPEED_STDDEV_KMH))
            .collect();

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>()
            / samples.len() as f64;

        assert!((mean - SPEED_MEAN_KMH).abs() < 1.0, "mean {} drifted", mean);
        let stddev = variance.sqrt();
        assert!(
            stddev > 6.0 && stddev < 10.0,
            "stddev {} outside expected band",
            stddev
        );
    }

    #[test]
    fn test_solve_4x4_identity() {
        let a = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let b = [4.0, 3.0, 2.0, 1.0];
        assert_eq!(solve_4x4(a, b), Some(b));
    }

    #[test]
    fn test_solve_4x4_singular() {
        let a = [
            [1.0, 2.0, 3.0, 4.0],
            [2.0, 4.0, 6.0, 8.0],
            [1.0, 0.0, 1.0, 0.0],
            [0.0, 1.0, 0.0, 1.0],
        ];
        let b = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(solve_4x4(a, b), None);

        assert_eq!(solve_4x4([[0.0; 4]; 4], [0.0; 4]), None);
    }
}
