//! Fixed-round k-means over raw latitude/longitude
//!
//! Centroids start at the first `k` records in input order, so results are
//! reproducible. Distances are squared Euclidean in degree space with no
//! geodesic correction. The loop always runs the configured number of rounds
//! (at least one) and never checks for convergence; callers must not assume
//! it converged.

use serde::{Deserialize, Serialize};

use crate::config::ClusteringConfig;
use crate::types::CountryRecord;

/// Cluster centre in degree space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub latitude: f64,
    pub longitude: f64,
}

impl Centroid {
    fn of(record: &CountryRecord) -> Self {
        Self {
            latitude: record.latitude,
            longitude: record.longitude,
        }
    }

    fn distance_sq(&self, record: &CountryRecord) -> f64 {
        let dx = record.latitude - self.latitude;
        let dy = record.longitude - self.longitude;
        dx * dx + dy * dy
    }
}

/// Per-cluster aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub id: usize,
    pub count: usize,
    /// Absent for an empty cluster
    pub mean_internet: Option<f64>,
    /// Absent for an empty cluster
    pub mean_happiness: Option<f64>,
}

/// Output of a completed clustering run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    /// Cluster id per record, in record order
    pub assignments: Vec<usize>,
    /// Centroids after the final update
    pub centroids: Vec<Centroid>,
    /// One entry per cluster, in index order
    pub summaries: Vec<ClusterSummary>,
    /// Rounds executed
    pub rounds: usize,
}

impl ClusteringResult {
    /// Total members across all clusters
    pub fn assigned_count(&self) -> usize {
        self.summaries.iter().map(|s| s.count).sum()
    }
}

/// Clustering result or the reason it was skipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClusteringOutcome {
    Clustered(ClusteringResult),
    /// Fewer records than clusters
    InsufficientData { required: usize, available: usize },
}

impl ClusteringOutcome {
    pub fn result(&self) -> Option<&ClusteringResult> {
        match self {
            ClusteringOutcome::Clustered(result) => Some(result),
            ClusteringOutcome::InsufficientData { .. } => None,
        }
    }
}

/// k-means clusterer with a fixed round count
#[derive(Debug, Clone)]
pub struct SpatialClusterer {
    k: usize,
    rounds: usize,
}

impl Default for SpatialClusterer {
    fn default() -> Self {
        Self::from_config(&ClusteringConfig::default())
    }
}

impl SpatialClusterer {
    /// Create a clusterer with `k` clusters and a fixed number of rounds
    pub fn new(k: usize, rounds: usize) -> Self {
        Self { k, rounds }
    }

    pub fn from_config(config: &ClusteringConfig) -> Self {
        Self::new(config.cluster_count, config.rounds)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Partition records into `k` groups
    pub fn cluster(&self, records: &[CountryRecord]) -> ClusteringOutcome {
        if self.k == 0 || records.len() < self.k {
            tracing::warn!(
                "Not enough location data to form {} clusters ({} records)",
                self.k,
                records.len()
            );
            return ClusteringOutcome::InsufficientData {
                required: self.k.max(1),
                available: records.len(),
            };
        }

        let mut centroids: Vec<Centroid> = records[..self.k].iter().map(Centroid::of).collect();
        let mut assignments = vec![0usize; records.len()];

        // Every record gets a real assignment even with zero rounds configured
        let rounds = self.rounds.max(1);
        for _ in 0..rounds {
            for (slot, record) in assignments.iter_mut().zip(records) {
                *slot = nearest(&centroids, record);
            }
            update_centroids(&mut centroids, &assignments, records);
        }

        let summaries = (0..self.k)
            .map(|id| summarize(id, &assignments, records))
            .collect();

        tracing::info!("Clustered {} records into {} groups", records.len(), self.k);

        ClusteringOutcome::Clustered(ClusteringResult {
            assignments,
            centroids,
            summaries,
            rounds,
        })
    }
}

/// Index of the closest centroid; ties go to the lowest index
fn nearest(centroids: &[Centroid], record: &CountryRecord) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = c.distance_sq(record);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// Move each centroid to the mean of its members; empty clusters stay put
fn update_centroids(centroids: &mut [Centroid], assignments: &[usize], records: &[CountryRecord]) {
    let mut sums = vec![(0.0f64, 0.0f64, 0usize); centroids.len()];
    for (&cluster, record) in assignments.iter().zip(records) {
        let entry = &mut sums[cluster];
        entry.0 += record.latitude;
        entry.1 += record.longitude;
        entry.2 += 1;
    }

    for (centroid, (lat, lon, n)) in centroids.iter_mut().zip(sums) {
        if n > 0 {
            centroid.latitude = lat / n as f64;
            centroid.longitude = lon / n as f64;
        }
    }
}

fn summarize(id: usize, assignments: &[usize], records: &[CountryRecord]) -> ClusterSummary {
    let (count, sum_internet, sum_happiness) = assignments
        .iter()
        .zip(records)
        .filter(|(cluster, _)| **cluster == id)
        .fold((0usize, 0.0, 0.0), |(n, si, sh), (_, r)| {
            (n + 1, si + r.internet_usage_percent, sh + r.happiness_score)
        });

    let mean = |sum: f64| (count > 0).then(|| sum / count as f64);
    ClusterSummary {
        id,
        count,
        mean_internet: mean(sum_internet),
        mean_happiness: mean(sum_happiness),
    }
}
