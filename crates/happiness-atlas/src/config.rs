//! Configuration for the analysis pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtlasConfig {
    /// Table join configuration
    #[serde(default)]
    pub merge: MergeConfig,
    /// Spatial clustering configuration
    #[serde(default)]
    pub clustering: ClusteringConfig,
    /// Local slope (geographically weighted) configuration
    #[serde(default)]
    pub local_slope: LocalSlopeConfig,
    /// Residual ranking configuration
    #[serde(default)]
    pub residuals: ResidualConfig,
}

impl AtlasConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit path, the user config directory, or defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path().filter(|p| p.is_file()),
        };

        match candidate {
            Some(p) => {
                tracing::info!("Loading configuration from {}", p.display());
                let text = std::fs::read_to_string(&p)?;
                Self::from_toml_str(&text)
            }
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// `<config_dir>/happiness-atlas/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("happiness-atlas").join("config.toml"))
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the analysis cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.clustering.cluster_count == 0 {
            return Err(Error::config("clustering.cluster_count must be at least 1"));
        }
        if self.clustering.rounds == 0 {
            return Err(Error::config("clustering.rounds must be at least 1"));
        }
        let bw = self.local_slope.bandwidth_km;
        if !bw.is_finite() || bw <= 0.0 {
            return Err(Error::config(format!(
                "local_slope.bandwidth_km must be a positive number, got {}",
                bw
            )));
        }
        if self.local_slope.min_neighbors == 0 {
            return Err(Error::config("local_slope.min_neighbors must be at least 1"));
        }
        let threshold = self.local_slope.singular_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(Error::config(format!(
                "local_slope.singular_threshold must be a positive number, got {}",
                threshold
            )));
        }
        let r = self.local_slope.earth_radius_km;
        if !r.is_finite() || r <= 0.0 {
            return Err(Error::config("local_slope.earth_radius_km must be positive"));
        }
        for (from, to) in &self.merge.extra_aliases {
            if from.trim().is_empty() || to.trim().is_empty() {
                return Err(Error::config("merge.extra_aliases entries must be non-empty"));
            }
        }
        Ok(())
    }
}

/// What to do when two internet rows normalize to the same country
///
/// Repeated happiness rows always resolve to the last score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCollisionPolicy {
    /// Keep the first row seen, report later ones as dropped
    #[default]
    FirstWins,
    /// Keep the last row seen, report earlier ones as dropped
    LastWins,
    /// Keep every internet row
    KeepAll,
}

/// Table join configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Behaviour on duplicate country keys
    #[serde(default)]
    pub collision_policy: KeyCollisionPolicy,
    /// Column names of the internet-usage table
    #[serde(default)]
    pub internet_columns: InternetColumns,
    /// Column names of the happiness table
    #[serde(default)]
    pub happiness_columns: HappinessColumns,
    /// Aliases applied on top of the built-in table
    #[serde(default)]
    pub extra_aliases: BTreeMap<String, String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            collision_policy: KeyCollisionPolicy::FirstWins,
            internet_columns: InternetColumns::default(),
            happiness_columns: HappinessColumns::default(),
            extra_aliases: BTreeMap::new(),
        }
    }
}

/// Internet-usage table column names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternetColumns {
    #[serde(default = "default_country_column")]
    pub country: String,
    #[serde(default = "default_usage_column")]
    pub usage_percent: String,
    #[serde(default = "default_latitude_column")]
    pub latitude: String,
    #[serde(default = "default_longitude_column")]
    pub longitude: String,
}

impl Default for InternetColumns {
    fn default() -> Self {
        Self {
            country: default_country_column(),
            usage_percent: default_usage_column(),
            latitude: default_latitude_column(),
            longitude: default_longitude_column(),
        }
    }
}

/// Happiness table column names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HappinessColumns {
    #[serde(default = "default_country_column")]
    pub country: String,
    #[serde(default = "default_ladder_column")]
    pub score: String,
}

impl Default for HappinessColumns {
    fn default() -> Self {
        Self {
            country: default_country_column(),
            score: default_ladder_column(),
        }
    }
}

fn default_country_column() -> String { "Country".to_string() }
fn default_usage_column() -> String { "PctOfPopulationUsingInternet".to_string() }
fn default_latitude_column() -> String { "Latitude".to_string() }
fn default_longitude_column() -> String { "Longitude".to_string() }
fn default_ladder_column() -> String { "Ladder score".to_string() }

/// Spatial clustering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Number of clusters (default: 3)
    #[serde(default = "default_cluster_count")]
    pub cluster_count: usize,
    /// Assignment/update rounds, run unconditionally (default: 5)
    #[serde(default = "default_rounds")]
    pub rounds: usize,
}

/// Default number of clusters
pub const DEFAULT_CLUSTER_COUNT: usize = 3;
/// Default number of k-means rounds; there is no convergence check
pub const DEFAULT_CLUSTER_ROUNDS: usize = 5;

fn default_cluster_count() -> usize { DEFAULT_CLUSTER_COUNT }
fn default_rounds() -> usize { DEFAULT_CLUSTER_ROUNDS }

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            cluster_count: DEFAULT_CLUSTER_COUNT,
            rounds: DEFAULT_CLUSTER_ROUNDS,
        }
    }
}

/// Local slope configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSlopeConfig {
    /// Neighbour radius and kernel bandwidth in km (default: 2500)
    #[serde(default = "default_bandwidth_km")]
    pub bandwidth_km: f64,
    /// Minimum neighbours, the record itself included (default: 5)
    #[serde(default = "default_min_neighbors")]
    pub min_neighbors: usize,
    /// Determinant magnitude below which the fit is ill-conditioned (default: 1e-9)
    #[serde(default = "default_singular_threshold")]
    pub singular_threshold: f64,
    /// Earth radius for the haversine distance (default: 6371)
    #[serde(default = "default_earth_radius_km")]
    pub earth_radius_km: f64,
}

fn default_bandwidth_km() -> f64 { 2500.0 }
fn default_min_neighbors() -> usize { 5 }
fn default_singular_threshold() -> f64 { 1e-9 }
fn default_earth_radius_km() -> f64 { 6371.0 }

impl Default for LocalSlopeConfig {
    fn default() -> Self {
        Self {
            bandwidth_km: 2500.0,
            min_neighbors: 5,
            singular_threshold: 1e-9,
            earth_radius_km: 6371.0,
        }
    }
}

/// Residual ranking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualConfig {
    /// Length of the anomaly listing (default: 10)
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Entries in each of the above/below-line lists (default: 3)
    #[serde(default = "default_extremes")]
    pub extremes: usize,
    /// Merged records required before anomalies are listed (default: 5)
    #[serde(default = "default_min_records")]
    pub min_records_for_anomalies: usize,
}

fn default_top_n() -> usize { 10 }
fn default_extremes() -> usize { 3 }
fn default_min_records() -> usize { 5 }

impl Default for ResidualConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            extremes: 3,
            min_records_for_anomalies: 5,
        }
    }
}
