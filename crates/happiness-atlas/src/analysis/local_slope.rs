//! Per-record Gaussian-weighted local slope
//!
//! For every record, neighbours are all records (itself included) within
//! `bandwidth_km` great-circle distance. A weighted least-squares fit of
//! happiness on internet usage over that neighbourhood gives the local slope.
//!
//! Cost is O(n²): every record scans every other record. That is fine for a
//! few hundred countries and does not scale beyond that.

use serde::{Deserialize, Serialize};

use crate::config::LocalSlopeConfig;
use crate::types::{CountryRecord, LocalSlope};

/// Great-circle distance in kilometres (haversine, asin form)
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64, radius_km: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `a` just past 1 for antipodal points
    2.0 * radius_km * a.clamp(0.0, 1.0).sqrt().asin()
}

/// Slopes for a whole record set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSlopeResult {
    /// Outcome per record, in record order
    pub slopes: Vec<LocalSlope>,
    /// Smallest estimated slope
    pub min_slope: Option<f64>,
    /// Largest estimated slope
    pub max_slope: Option<f64>,
    pub estimated: usize,
    pub insufficient: usize,
    pub ill_conditioned: usize,
}

impl LocalSlopeResult {
    fn from_slopes(slopes: Vec<LocalSlope>) -> Self {
        let mut result = Self {
            slopes: Vec::new(),
            min_slope: None,
            max_slope: None,
            estimated: 0,
            insufficient: 0,
            ill_conditioned: 0,
        };

        for slope in &slopes {
            match *slope {
                LocalSlope::Estimated { slope: value, .. } => {
                    result.estimated += 1;
                    result.min_slope = Some(result.min_slope.map_or(value, |m| m.min(value)));
                    result.max_slope = Some(result.max_slope.map_or(value, |m| m.max(value)));
                }
                LocalSlope::InsufficientNeighbors { .. } => result.insufficient += 1,
                LocalSlope::IllConditioned { .. } => result.ill_conditioned += 1,
            }
        }

        result.slopes = slopes;
        result
    }
}

/// Local slope result or the reason it was skipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocalSlopeOutcome {
    Estimated(LocalSlopeResult),
    /// The whole set is smaller than one neighbourhood
    InsufficientData { required: usize, available: usize },
}

impl LocalSlopeOutcome {
    pub fn result(&self) -> Option<&LocalSlopeResult> {
        match self {
            LocalSlopeOutcome::Estimated(result) => Some(result),
            LocalSlopeOutcome::InsufficientData { .. } => None,
        }
    }
}

/// Weighted sums of the normal equations for `y = a + b x`
#[derive(Debug, Default)]
struct WeightedSums {
    s11: f64,
    s12: f64,
    s22: f64,
    t1: f64,
    t2: f64,
}

impl WeightedSums {
    fn add(&mut self, w: f64, x: f64, y: f64) {
        self.s11 += w;
        self.s12 += w * x;
        self.s22 += w * x * x;
        self.t1 += w * y;
        self.t2 += w * x * y;
    }

    fn determinant(&self) -> f64 {
        self.s11 * self.s22 - self.s12 * self.s12
    }

    fn slope(&self, det: f64) -> f64 {
        (self.t2 * self.s11 - self.t1 * self.s12) / det
    }
}

/// Fixed-bandwidth local slope estimator
#[derive(Debug, Clone)]
pub struct LocalSlopeEstimator {
    config: LocalSlopeConfig,
}

impl Default for LocalSlopeEstimator {
    fn default() -> Self {
        Self::from_config(&LocalSlopeConfig::default())
    }
}

impl LocalSlopeEstimator {
    pub fn from_config(config: &LocalSlopeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &LocalSlopeConfig {
        &self.config
    }

    /// Estimate a slope for every record
    pub fn estimate(&self, records: &[CountryRecord]) -> LocalSlopeOutcome {
        if records.len() < self.config.min_neighbors {
            tracing::warn!(
                "Not enough points with coordinates for local slopes (need {}, have {})",
                self.config.min_neighbors,
                records.len()
            );
            return LocalSlopeOutcome::InsufficientData {
                required: self.config.min_neighbors,
                available: records.len(),
            };
        }

        let slopes: Vec<LocalSlope> = records
            .iter()
            .map(|center| self.slope_around(center, records))
            .collect();
        let result = LocalSlopeResult::from_slopes(slopes);

        tracing::info!(
            estimated = result.estimated,
            insufficient = result.insufficient,
            ill_conditioned = result.ill_conditioned,
            "Computed local slopes for {} records",
            records.len()
        );

        LocalSlopeOutcome::Estimated(result)
    }

    /// Estimate the slope centred on `records[index]`; `None` if out of range
    pub fn estimate_at(&self, index: usize, records: &[CountryRecord]) -> Option<LocalSlope> {
        let center = records.get(index)?;
        Some(self.slope_around(center, records))
    }

    fn slope_around(&self, center: &CountryRecord, records: &[CountryRecord]) -> LocalSlope {
        let bandwidth = self.config.bandwidth_km;
        let bandwidth_sq = bandwidth * bandwidth;

        let mut sums = WeightedSums::default();
        let mut neighbors = 0usize;
        for other in records {
            let d = haversine_km(
                center.latitude,
                center.longitude,
                other.latitude,
                other.longitude,
                self.config.earth_radius_km,
            );
            if d <= bandwidth {
                neighbors += 1;
                let w = (-(d * d) / bandwidth_sq).exp();
                sums.add(w, other.internet_usage_percent, other.happiness_score);
            }
        }

        if neighbors < self.config.min_neighbors {
            return LocalSlope::InsufficientNeighbors { neighbors };
        }

        let det = sums.determinant();
        if det.abs() < self.config.singular_threshold {
            tracing::debug!("Ill-conditioned neighbourhood around {}", center.country);
            return LocalSlope::IllConditioned { neighbors };
        }

        LocalSlope::Estimated {
            slope: sums.slope(det),
            neighbors,
        }
    }
}
