//! Scalar Kalman filter for a single room's RSSI stream.
//!
//! BLE advertisements are noisy: multipath fading and body attenuation
//! swing readings by 10+ dBm between packets. Each room runs one filter
//! instance with a static identity process model (the beacon is assumed
//! stationary between readings), which reduces to exponential-style
//! smoothing with a gain derived from the running covariance.
//!
//! Filter state lives and dies with its room's observation: when a room
//! expires, the filter is discarded, and a reappearing room starts from
//! scratch.

/// Default process noise (R). Small, because the "true" signal strength
/// of a stationary beacon drifts slowly.
pub const DEFAULT_PROCESS_NOISE: f64 = 0.01;

/// Default measurement noise (Q), matching the dBm-scale variance of
/// consumer BLE receivers.
pub const DEFAULT_MEASUREMENT_NOISE: f64 = 5.0;

/// Recursive scalar estimator over integer dBm measurements.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    /// Running estimate; `None` until the first measurement arrives.
    estimate: Option<f64>,
    /// Running estimation covariance.
    cov: f64,
    process_noise: f64,
    measurement_noise: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new(DEFAULT_PROCESS_NOISE, DEFAULT_MEASUREMENT_NOISE)
    }
}

impl KalmanFilter {
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            estimate: None,
            cov: 0.0,
            process_noise,
            measurement_noise,
        }
    }

    /// Fold one measurement into the estimate and return it, truncated
    /// toward zero. The first measurement seeds the filter and is
    /// returned as-is.
    pub fn filter(&mut self, measurement: i64) -> i64 {
        let m = measurement as f64;
        let updated = match self.estimate {
            None => {
                self.cov = self.measurement_noise;
                m
            }
            Some(x) => {
                // Identity state transition: predicted estimate is x,
                // only the covariance grows by the process noise.
                let predicted_cov = self.cov + self.process_noise;
                let gain = predicted_cov / (predicted_cov + self.measurement_noise);
                self.cov = predicted_cov * (1.0 - gain);
                x + gain * (m - x)
            }
        };
        self.estimate = Some(updated);
        // Truncation, not rounding: -55.9 reads as -55.
        updated as i64
    }
}
