//! Residual ranking against the global regression line

use serde::{Deserialize, Serialize};

use super::statistics::RegressionModel;
use crate::config::ResidualConfig;
use crate::types::CountryRecord;

/// One record's distance from the regression line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualEntry {
    /// Position in the merged record set
    pub index: usize,
    pub country: String,
    pub internet: f64,
    pub happiness: f64,
    pub predicted: f64,
    /// Observed minus predicted happiness
    pub residual: f64,
}

/// Top-N anomaly view, or why it was withheld
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnomalyListing {
    Listed { entries: Vec<ResidualEntry> },
    InsufficientData { required: usize, available: usize },
}

impl AnomalyListing {
    pub fn entries(&self) -> &[ResidualEntry] {
        match self {
            AnomalyListing::Listed { entries } => entries,
            AnomalyListing::InsufficientData { .. } => &[],
        }
    }
}

/// Residual orderings over the merged set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualRanking {
    /// Every record by descending |residual|, ties in input order
    pub by_magnitude: Vec<ResidualEntry>,
    /// Largest positive residuals first (happier than predicted)
    pub most_positive: Vec<ResidualEntry>,
    /// Most negative residuals first (less happy than predicted)
    pub most_negative: Vec<ResidualEntry>,
    pub anomalies: AnomalyListing,
}

impl ResidualRanking {
    /// First `n` entries of the magnitude ordering
    pub fn top(&self, n: usize) -> &[ResidualEntry] {
        &self.by_magnitude[..n.min(self.by_magnitude.len())]
    }
}

/// Builds residual rankings from a regression model
#[derive(Debug, Clone)]
pub struct ResidualRanker {
    top_n: usize,
    extremes: usize,
    min_records_for_anomalies: usize,
}

impl Default for ResidualRanker {
    fn default() -> Self {
        Self::from_config(&ResidualConfig::default())
    }
}

impl ResidualRanker {
    pub fn from_config(config: &ResidualConfig) -> Self {
        Self {
            top_n: config.top_n,
            extremes: config.extremes,
            min_records_for_anomalies: config.min_records_for_anomalies,
        }
    }

    pub fn rank(&self, records: &[CountryRecord], model: &RegressionModel) -> ResidualRanking {
        let entries: Vec<ResidualEntry> = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let predicted = model.predict(record.internet_usage_percent);
                ResidualEntry {
                    index,
                    country: record.country.clone(),
                    internet: record.internet_usage_percent,
                    happiness: record.happiness_score,
                    predicted,
                    residual: record.happiness_score - predicted,
                }
            })
            .collect();

        // `sort_by` is stable, so equal keys keep input order
        let mut by_magnitude = entries.clone();
        by_magnitude.sort_by(|a, b| b.residual.abs().total_cmp(&a.residual.abs()));

        let mut most_positive = entries.clone();
        most_positive.sort_by(|a, b| b.residual.total_cmp(&a.residual));
        most_positive.truncate(self.extremes);

        let mut most_negative = entries;
        most_negative.sort_by(|a, b| a.residual.total_cmp(&b.residual));
        most_negative.truncate(self.extremes);

        let anomalies = if records.len() < self.min_records_for_anomalies {
            tracing::info!(
                "Anomaly listing needs {} records, have {}",
                self.min_records_for_anomalies,
                records.len()
            );
            AnomalyListing::InsufficientData {
                required: self.min_records_for_anomalies,
                available: records.len(),
            }
        } else {
            AnomalyListing::Listed {
                entries: by_magnitude.iter().take(self.top_n).cloned().collect(),
            }
        };

        ResidualRanking {
            by_magnitude,
            most_positive,
            most_negative,
            anomalies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, internet: f64, happiness: f64) -> CountryRecord {
        CountryRecord::new(name, internet, happiness, 0.0, 0.0)
    }

    fn names(entries: &[ResidualEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.country.as_str()).collect()
    }

    // Flat line at 5.0, so residual = happiness - 5
    const FLAT: RegressionModel = RegressionModel { slope: 0.0, intercept: 5.0 };

    #[test]
    fn test_magnitude_order_with_stable_ties() {
        let records = vec![
            rec("A", 10.0, 5.5),
            rec("B", 20.0, 3.0),
            rec("C", 30.0, 7.0),
            rec("D", 40.0, 4.5),
            rec("E", 50.0, 6.0),
        ];
        let ranking = ResidualRanker::default().rank(&records, &FLAT);

        // B and C tie at |2.0|, A and D tie at |0.5|
        assert_eq!(names(&ranking.by_magnitude), vec!["B", "C", "E", "A", "D"]);
        assert_eq!(ranking.by_magnitude[0].index, 1);
        assert_eq!(ranking.by_magnitude[0].residual, -2.0);
        assert_eq!(names(ranking.anomalies.entries()), vec!["B", "C", "E", "A", "D"]);
    }

    #[test]
    fn test_extremes_are_independent_sorts() {
        let records = vec![
            rec("A", 10.0, 5.5),
            rec("B", 20.0, 3.0),
            rec("C", 30.0, 7.0),
            rec("D", 40.0, 4.5),
            rec("E", 50.0, 6.0),
        ];
        let ranking = ResidualRanker::default().rank(&records, &FLAT);

        assert_eq!(names(&ranking.most_positive), vec!["C", "E", "A"]);
        assert_eq!(names(&ranking.most_negative), vec!["B", "D", "A"]);
    }

    #[test]
    fn test_first_entry_has_largest_magnitude() {
        let model = RegressionModel { slope: 0.03, intercept: 4.0 };
        let records: Vec<_> = (0..30)
            .map(|i| rec("X", i as f64 * 3.0, 4.0 + ((i * 7) % 11) as f64 * 0.3))
            .collect();
        let ranking = ResidualRanker::default().rank(&records, &model);

        let first = ranking.by_magnitude[0].residual.abs();
        assert!(ranking.by_magnitude.iter().all(|e| e.residual.abs() <= first));
        assert_eq!(ranking.anomalies.entries().len(), 10);
        assert_eq!(ranking.top(3).len(), 3);
        assert_eq!(ranking.top(100).len(), 30);
    }

    #[test]
    fn test_anomalies_withheld_below_minimum() {
        let records = vec![rec("A", 90.0, 8.0), rec("B", 10.0, 4.0), rec("C", 50.0, 7.0)];
        let ranking = ResidualRanker::default().rank(&records, &FLAT);

        assert_eq!(
            ranking.anomalies,
            AnomalyListing::InsufficientData { required: 5, available: 3 }
        );
        assert!(ranking.anomalies.entries().is_empty());
        // Extremes are still available
        assert_eq!(names(&ranking.most_positive), vec!["A", "C", "B"]);
        assert_eq!(ranking.by_magnitude.len(), 3);
    }

    #[test]
    fn test_residuals_on_exact_fit_are_zero() {
        let records = vec![rec("A", 90.0, 8.0), rec("B", 10.0, 4.0)];
        let model = RegressionModel::fit(&records).unwrap();
        let ranking = ResidualRanker::default().rank(&records, &model);

        assert!(ranking.by_magnitude.iter().all(|e| e.residual.abs() < 1e-9));
    }
}
