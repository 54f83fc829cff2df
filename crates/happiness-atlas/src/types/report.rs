//! Final pipeline output

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::{CountryRecord, LocalSlope};
use crate::analysis::{
    AnomalyListing, ClusteringOutcome, Interpretation, LocalSlopeOutcome, ResidualRanking,
    StatisticsSummary,
};
use crate::error::Result;
use crate::ingestion::{DroppedRow, MergeOutcome, SourceTable};

/// Row counts and exclusions from the merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub internet_rows: usize,
    pub happiness_rows: usize,
    pub merged: usize,
    pub dropped: Vec<DroppedRow>,
}

impl MergeSummary {
    pub fn from_outcome(outcome: &MergeOutcome) -> Self {
        Self {
            internet_rows: outcome.internet_rows,
            happiness_rows: outcome.happiness_rows,
            merged: outcome.records.len(),
            dropped: outcome.dropped.clone(),
        }
    }

    fn dropped_from(&self, table: SourceTable) -> usize {
        self.dropped.iter().filter(|d| d.table == table).count()
    }
}

/// Everything one pipeline run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub merge: MergeSummary,
    /// Merged records with derived fields filled in
    pub records: Vec<CountryRecord>,
    pub statistics: StatisticsSummary,
    pub clustering: ClusteringOutcome,
    pub local_slopes: LocalSlopeOutcome,
    /// `None` without a regression model
    pub residuals: Option<ResidualRanking>,
    /// `None` with fewer than two records
    pub interpretation: Option<Interpretation>,
}

impl AnalysisReport {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plain-text summary for terminals
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "Happiness atlas run {}", self.run_id)?;
        writeln!(out, "Generated {}", self.generated_at.to_rfc3339())?;
        writeln!(out)?;

        let merge = &self.merge;
        writeln!(
            out,
            "Merged {} countries ({} internet rows, {} happiness rows)",
            merge.merged, merge.internet_rows, merge.happiness_rows
        )?;
        writeln!(
            out,
            "Dropped {} internet rows, {} happiness rows",
            merge.dropped_from(SourceTable::Internet),
            merge.dropped_from(SourceTable::Happiness)
        )?;
        writeln!(out)?;

        let corr = &self.statistics.correlation;
        match &corr.degeneracy {
            None => writeln!(out, "Correlation: r = {:.3} (n = {})", corr.r, corr.n)?,
            Some(reason) => writeln!(out, "Correlation: r = {:.3} (fallback: {:?})", corr.r, reason)?,
        }
        match &self.statistics.regression {
            Some(reg) => writeln!(out, "Regression: {}  R2 = {:.3}", reg.model, reg.r_squared)?,
            None => writeln!(out, "Regression: not computed (need 2+ countries)")?,
        }
        writeln!(out)?;

        match &self.clustering {
            ClusteringOutcome::Clustered(result) => {
                writeln!(out, "Clusters ({} rounds):", result.rounds)?;
                writeln!(
                    out,
                    "  {:>2}  {:>5}  {:>13}  {:>14}",
                    "id", "count", "mean internet", "mean happiness"
                )?;
                for s in &result.summaries {
                    writeln!(
                        out,
                        "  {:>2}  {:>5}  {:>13}  {:>14}",
                        s.id,
                        s.count,
                        fmt_opt(s.mean_internet, 1),
                        fmt_opt(s.mean_happiness, 2)
                    )?;
                }
            }
            ClusteringOutcome::InsufficientData { required, available } => writeln!(
                out,
                "Clusters: not enough location data (need {}, have {})",
                required, available
            )?,
        }
        writeln!(out)?;

        match &self.local_slopes {
            LocalSlopeOutcome::Estimated(result) => {
                writeln!(
                    out,
                    "Local slopes: {} estimated, {} too few neighbours, {} ill-conditioned",
                    result.estimated, result.insufficient, result.ill_conditioned
                )?;
                if let (Some(min), Some(max)) = (result.min_slope, result.max_slope) {
                    writeln!(out, "  range {:.4} to {:.4}", min, max)?;
                }
            }
            LocalSlopeOutcome::InsufficientData { required, available } => writeln!(
                out,
                "Local slopes: not enough points with coordinates (need {}, have {})",
                required, available
            )?,
        }
        writeln!(out)?;

        if let Some(residuals) = &self.residuals {
            match &residuals.anomalies {
                AnomalyListing::Listed { entries } => {
                    writeln!(out, "Largest residuals:")?;
                    for e in entries {
                        writeln!(out, "  {}: residual {:.2}", e.country, e.residual)?;
                    }
                }
                AnomalyListing::InsufficientData { required, .. } => writeln!(
                    out,
                    "Not enough data for anomalies (need {}+ countries).",
                    required
                )?,
            }
            writeln!(out)?;
        }

        if let Some(interp) = &self.interpretation {
            writeln!(out, "{}", interp.sentence)?;
            if let Some(pattern) = &interp.pattern_summary {
                writeln!(out, "{}", pattern)?;
            }
        }

        Ok(())
    }

    /// Write the merged records, derived fields included, as CSV
    pub fn write_records_csv<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record([
            "country",
            "internet_usage_percent",
            "happiness_score",
            "latitude",
            "longitude",
            "cluster_id",
            "local_slope",
            "local_slope_status",
            "neighbors",
        ])?;

        for r in &self.records {
            let (slope, status, neighbors) = match r.local_slope {
                Some(LocalSlope::Estimated { slope, neighbors }) => {
                    (slope.to_string(), "estimated", neighbors.to_string())
                }
                Some(LocalSlope::InsufficientNeighbors { neighbors }) => {
                    (String::new(), "insufficient_neighbors", neighbors.to_string())
                }
                Some(LocalSlope::IllConditioned { neighbors }) => {
                    (String::new(), "ill_conditioned", neighbors.to_string())
                }
                None => (String::new(), "not_computed", String::new()),
            };

            csv.write_record([
                r.country.clone(),
                r.internet_usage_percent.to_string(),
                r.happiness_score.to_string(),
                r.latitude.to_string(),
                r.longitude.to_string(),
                r.cluster_id.map(|c| c.to_string()).unwrap_or_default(),
                slope,
                status.to_string(),
                neighbors,
            ])?;
        }

        csv.flush()?;
        Ok(())
    }
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "-".to_string(),
    }
}
