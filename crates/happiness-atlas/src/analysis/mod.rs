//! Statistics, clustering, local slopes, residuals and interpretation

pub mod clustering;
pub mod interpretation;
pub mod local_slope;
pub mod residuals;
pub mod statistics;

pub use clustering::{ClusterSummary, ClusteringOutcome, ClusteringResult, SpatialClusterer};
pub use interpretation::{interpret, Direction, Interpretation, StrengthBand};
pub use local_slope::{haversine_km, LocalSlopeEstimator, LocalSlopeOutcome, LocalSlopeResult};
pub use residuals::{AnomalyListing, ResidualEntry, ResidualRanker, ResidualRanking};
pub use statistics::{
    correlation, describe, pearson, regression, CorrelationSummary, Degeneracy, RegressionModel,
    RegressionSummary, StatisticsSummary,
};
