//! Z-score spend anomaly detection.

use serde::{Deserialize, Serialize};

/// Default z-score above which a value is anomalous.
pub const DEFAULT_Z_THRESHOLD: f64 = 2.5;

/// Fewer historical samples than this never flag.
pub const MIN_SAMPLES: usize = 3;

/// Outcome of [`detect_anomaly`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub is_anomaly: bool,
    pub z_score: f64,
    pub mean: f64,
    pub std_dev: f64,
}

/// Compare `current` against the population mean and standard deviation of
/// `history`.
///
/// A constant history has no spread, so any deviation from it is flagged
/// and reported with an infinite z-score.
pub fn detect_anomaly(current: f64, history: &[f64], threshold: f64) -> AnomalyReport {
    if history.len() < MIN_SAMPLES {
        return AnomalyReport {
            is_anomaly: false,
            z_score: 0.0,
            mean: 0.0,
            std_dev: 0.0,
        };
    }

    let n = history.len() as f64;
    let mean = history.iter().sum::<f64>() / n;
    let variance = history.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        let differs = current != mean;
        return AnomalyReport {
            is_anomaly: differs,
            z_score: if differs { f64::INFINITY } else { 0.0 },
            mean,
            std_dev,
        };
    }

    let z_score = (current - mean) / std_dev;
    AnomalyReport {
        is_anomaly: z_score > threshold,
        z_score,
        mean,
        std_dev,
    }
}
