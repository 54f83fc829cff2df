//! Pipeline context: one merged record set and the stages run over it
//!
//! A context is built fresh per run and owns its configuration, records and
//! run id; nothing is global. `cluster_id` and `local_slope` are each
//! written by exactly one stage, at most once per context.

use std::path::Path;

use chrono::Utc;
use uuid::Uuid;

use crate::analysis::{
    self, ClusteringOutcome, Interpretation, LocalSlopeEstimator, LocalSlopeOutcome,
    RegressionModel, ResidualRanker, ResidualRanking, SpatialClusterer, StatisticsSummary,
};
use crate::config::AtlasConfig;
use crate::error::{Error, Result};
use crate::ingestion::{self, DropReason, DroppedRow, MergeOutcome, RowMerger, SourceTable};
use crate::types::{AnalysisReport, CountryRecord, MergeSummary, RawRow};

/// State for one analysis run
#[derive(Debug)]
pub struct PipelineContext {
    run_id: Uuid,
    config: AtlasConfig,
    span: tracing::Span,
    merge: MergeOutcome,
    clustering: Option<ClusteringOutcome>,
    local_slopes: Option<LocalSlopeOutcome>,
}

impl PipelineContext {
    /// Validate the configuration and merge the two raw tables
    pub fn new(config: AtlasConfig, internet: &[RawRow], happiness: &[RawRow]) -> Result<Self> {
        config.validate()?;
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline", run_id = %run_id);

        let merge = {
            let _guard = span.enter();
            RowMerger::from_config(&config.merge).merge(internet, happiness)
        };

        Ok(Self {
            run_id,
            config,
            span,
            merge,
            clustering: None,
            local_slopes: None,
        })
    }

    /// Start from records that are already merged
    ///
    /// Derived fields on the input are cleared; this context's stages own them.
    /// Records with a non-finite field are dropped and reported like merge
    /// exclusions.
    pub fn from_records(config: AtlasConfig, records: Vec<CountryRecord>) -> Result<Self> {
        config.validate()?;
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline", run_id = %run_id);
        let rows = records.len();

        let mut kept = Vec::with_capacity(rows);
        let mut dropped = Vec::new();
        for (row_index, mut record) in records.into_iter().enumerate() {
            if !record.is_complete() {
                let _guard = span.enter();
                tracing::debug!(
                    "Dropped record {} ({}): non-finite value",
                    row_index,
                    record.country
                );
                dropped.push(DroppedRow {
                    table: SourceTable::Internet,
                    row_index,
                    country: Some(record.country),
                    reason: DropReason::NonFiniteValue,
                });
                continue;
            }
            record.cluster_id = None;
            record.local_slope = None;
            kept.push(record);
        }

        Ok(Self {
            run_id,
            config,
            span,
            merge: MergeOutcome {
                records: kept,
                dropped,
                internet_rows: rows,
                happiness_rows: rows,
            },
            clustering: None,
            local_slopes: None,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    pub fn records(&self) -> &[CountryRecord] {
        &self.merge.records
    }

    pub fn merge_outcome(&self) -> &MergeOutcome {
        &self.merge
    }

    pub fn statistics(&self) -> StatisticsSummary {
        let _guard = self.span.enter();
        analysis::describe(&self.merge.records)
    }

    /// Global regression line, recomputed on every call
    pub fn regression_model(&self) -> Option<RegressionModel> {
        RegressionModel::fit(&self.merge.records)
    }

    /// Cluster the records and write each `cluster_id`
    pub fn run_clustering(&mut self) -> Result<&ClusteringOutcome> {
        if self.clustering.is_some() {
            return Err(Error::StageAlreadyRun("clustering"));
        }
        let span = self.span.clone();
        let _guard = span.enter();

        let outcome =
            SpatialClusterer::from_config(&self.config.clustering).cluster(&self.merge.records);
        if let Some(result) = outcome.result() {
            for (record, &cluster) in self.merge.records.iter_mut().zip(&result.assignments) {
                record.cluster_id = Some(cluster);
            }
        }

        let stored: &ClusteringOutcome = self.clustering.insert(outcome);
        Ok(stored)
    }

    /// Estimate local slopes and write each `local_slope`
    pub fn run_local_slopes(&mut self) -> Result<&LocalSlopeOutcome> {
        if self.local_slopes.is_some() {
            return Err(Error::StageAlreadyRun("local_slopes"));
        }
        let span = self.span.clone();
        let _guard = span.enter();

        let outcome =
            LocalSlopeEstimator::from_config(&self.config.local_slope).estimate(&self.merge.records);
        if let Some(result) = outcome.result() {
            for (record, &slope) in self.merge.records.iter_mut().zip(&result.slopes) {
                record.local_slope = Some(slope);
            }
        }

        let stored: &LocalSlopeOutcome = self.local_slopes.insert(outcome);
        Ok(stored)
    }

    /// Residual rankings against the global line; `None` without a regression
    pub fn rank_residuals(&self) -> Option<ResidualRanking> {
        let model = self.regression_model()?;
        let ranker = ResidualRanker::from_config(&self.config.residuals);
        Some(ranker.rank(&self.merge.records, &model))
    }

    /// Plain-language reading; `None` with fewer than two records
    pub fn interpret(&self) -> Option<Interpretation> {
        if self.merge.records.len() < analysis::statistics::MIN_RECORDS {
            return None;
        }
        let r = analysis::correlation(&self.merge.records).r;
        let residuals = self.rank_residuals();
        Some(analysis::interpret(r, residuals.as_ref()))
    }

    /// Run any stage not run yet and assemble the report
    pub fn finish(mut self) -> Result<AnalysisReport> {
        let clustering = match self.clustering.clone() {
            Some(outcome) => outcome,
            None => self.run_clustering()?.clone(),
        };
        let local_slopes = match self.local_slopes.clone() {
            Some(outcome) => outcome,
            None => self.run_local_slopes()?.clone(),
        };

        let statistics = self.statistics();
        let residuals = self.rank_residuals();
        let interpretation = self.interpret();

        let _guard = self.span.enter();
        tracing::info!("Analysis finished for {} countries", self.merge.records.len());

        Ok(AnalysisReport {
            run_id: self.run_id,
            generated_at: Utc::now(),
            merge: MergeSummary::from_outcome(&self.merge),
            records: self.merge.records.clone(),
            statistics,
            clustering,
            local_slopes,
            residuals,
            interpretation,
        })
    }
}

/// Merge the raw tables and run every stage
pub fn analyze(
    config: &AtlasConfig,
    internet: &[RawRow],
    happiness: &[RawRow],
) -> Result<AnalysisReport> {
    PipelineContext::new(config.clone(), internet, happiness)?.finish()
}

/// Load both table files, then analyze them off the async runtime
pub async fn analyze_files(
    config: AtlasConfig,
    internet: &Path,
    happiness: &Path,
) -> Result<AnalysisReport> {
    // Both loads must finish before anything is merged
    let tables = ingestion::load_tables(internet, happiness).await?;
    tokio::task::spawn_blocking(move || analyze(&config, &tables.internet, &tables.happiness))
        .await?
}
