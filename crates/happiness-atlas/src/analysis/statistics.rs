//! Pearson correlation, ordinary least squares and R² over merged records
//!
//! Every degenerate input has a defined fallback instead of NaN: fewer than
//! two records or zero variance gives r = 0, zero total variance gives R² = 0.

use serde::{Deserialize, Serialize};

use crate::types::CountryRecord;

/// Records needed before correlation or regression mean anything
pub const MIN_RECORDS: usize = 2;

/// Why a statistic fell back to its default value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degeneracy {
    /// Not enough records to compute anything
    TooFewRecords { required: usize, available: usize },
    /// One of the variables has a single distinct value
    ZeroVariance,
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn all_equal(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Sums of squared deviations and cross-deviations: (sxx, syy, sxy)
fn deviation_sums(xs: &[f64], ys: &[f64]) -> (f64, f64, f64) {
    let n = xs.len().min(ys.len());
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let (Some(mx), Some(my)) = (mean(xs), mean(ys)) else {
        return (0.0, 0.0, 0.0);
    };

    xs.iter().zip(ys).fold((0.0, 0.0, 0.0), |(sxx, syy, sxy), (&x, &y)| {
        let dx = x - mx;
        let dy = y - my;
        (sxx + dx * dx, syy + dy * dy, sxy + dx * dy)
    })
}

/// Pearson r over paired values (extra values in the longer slice are ignored).
///
/// Returns 0 for fewer than two pairs or when either side has zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < MIN_RECORDS || all_equal(&xs[..n]) || all_equal(&ys[..n]) {
        return 0.0;
    }

    let (sxx, syy, sxy) = deviation_sums(xs, ys);
    if sxx <= 0.0 || syy <= 0.0 {
        return 0.0;
    }
    let r = sxy / (sxx * syy).sqrt();
    if r.is_finite() {
        r.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

fn internet_values(records: &[CountryRecord]) -> Vec<f64> {
    records.iter().map(|r| r.internet_usage_percent).collect()
}

fn happiness_values(records: &[CountryRecord]) -> Vec<f64> {
    records.iter().map(|r| r.happiness_score).collect()
}

/// Correlation between internet usage and happiness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSummary {
    /// Pearson r, 0 when degenerate
    pub r: f64,
    /// Number of records used
    pub n: usize,
    /// Set when `r` is a fallback value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degeneracy: Option<Degeneracy>,
}

impl CorrelationSummary {
    pub fn is_computed(&self) -> bool {
        self.degeneracy.is_none()
    }
}

/// Pearson correlation of internet usage against happiness
pub fn correlation(records: &[CountryRecord]) -> CorrelationSummary {
    let xs = internet_values(records);
    let ys = happiness_values(records);
    let n = records.len();

    let degeneracy = if n < MIN_RECORDS {
        Some(Degeneracy::TooFewRecords {
            required: MIN_RECORDS,
            available: n,
        })
    } else if all_equal(&xs) || all_equal(&ys) {
        Some(Degeneracy::ZeroVariance)
    } else {
        None
    };

    CorrelationSummary {
        r: pearson(&xs, &ys),
        n,
        degeneracy,
    }
}

/// `happiness = slope * internet + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionModel {
    pub slope: f64,
    pub intercept: f64,
}

impl RegressionModel {
    /// Closed-form OLS fit over paired values.
    ///
    /// `None` with fewer than two pairs. A single distinct x falls back to a
    /// flat line through the mean of y.
    pub fn fit_xy(xs: &[f64], ys: &[f64]) -> Option<Self> {
        let n = xs.len().min(ys.len());
        if n < MIN_RECORDS {
            return None;
        }
        let mx = mean(&xs[..n])?;
        let my = mean(&ys[..n])?;

        let (sxx, _, sxy) = deviation_sums(xs, ys);
        if all_equal(&xs[..n]) || sxx <= 0.0 {
            return Some(Self { slope: 0.0, intercept: my });
        }

        let slope = sxy / sxx;
        Some(Self {
            slope,
            intercept: my - slope * mx,
        })
    }

    /// Fit over merged records
    pub fn fit(records: &[CountryRecord]) -> Option<Self> {
        Self::fit_xy(&internet_values(records), &happiness_values(records))
    }

    /// Predicted happiness at a given internet usage
    pub fn predict(&self, internet: f64) -> f64 {
        self.slope * internet + self.intercept
    }

    /// Observed minus predicted happiness
    pub fn residual(&self, record: &CountryRecord) -> f64 {
        record.happiness_score - self.predict(record.internet_usage_percent)
    }

    /// `1 - SSE/SST`, 0 when SST is 0
    pub fn r_squared(&self, records: &[CountryRecord]) -> f64 {
        let ys = happiness_values(records);
        let Some(my) = mean(&ys) else {
            return 0.0;
        };

        let (sse, sst) = records.iter().fold((0.0, 0.0), |(sse, sst), r| {
            let err = self.residual(r);
            let dev = r.happiness_score - my;
            (sse + err * err, sst + dev * dev)
        });

        if sst == 0.0 || all_equal(&ys) {
            0.0
        } else {
            1.0 - sse / sst
        }
    }
}

impl std::fmt::Display for RegressionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.intercept < 0.0 {
            write!(f, "y={:.3}x-{:.3}", self.slope, -self.intercept)
        } else {
            write!(f, "y={:.3}x+{:.3}", self.slope, self.intercept)
        }
    }
}

/// Global regression and its fit quality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionSummary {
    pub model: RegressionModel,
    pub r_squared: f64,
    pub n: usize,
    /// Set when internet usage had a single distinct value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degeneracy: Option<Degeneracy>,
}

/// Fit the global regression; `None` with fewer than two records
pub fn regression(records: &[CountryRecord]) -> Option<RegressionSummary> {
    let model = RegressionModel::fit(records)?;
    let degeneracy = all_equal(&internet_values(records)).then_some(Degeneracy::ZeroVariance);

    Some(RegressionSummary {
        model,
        r_squared: model.r_squared(records),
        n: records.len(),
        degeneracy,
    })
}

/// Correlation plus regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    pub correlation: CorrelationSummary,
    /// `None` with fewer than two records
    pub regression: Option<RegressionSummary>,
}

/// Run every descriptive statistic over the merged set
pub fn describe(records: &[CountryRecord]) -> StatisticsSummary {
    let summary = StatisticsSummary {
        correlation: correlation(records),
        regression: regression(records),
    };

    match &summary.regression {
        Some(reg) => tracing::info!(
            "Pearson r = {:.3}, {} (R2 = {:.3}, n = {})",
            summary.correlation.r,
            reg.model,
            reg.r_squared,
            reg.n
        ),
        None => tracing::warn!(
            "Regression not computed: {} record(s), need {}",
            records.len(),
            MIN_RECORDS
        ),
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rec(name: &str, internet: f64, happiness: f64) -> CountryRecord {
        CountryRecord::new(name, internet, happiness, 0.0, 0.0)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_two_point_example() {
        let records = vec![rec("A", 90.0, 8.0), rec("B", 10.0, 4.0)];

        let corr = correlation(&records);
        assert!(approx(corr.r, 1.0));
        assert!(corr.is_computed());

        let reg = regression(&records).unwrap();
        assert!(approx(reg.model.slope, 0.05));
        assert!(approx(reg.model.intercept, 3.5));
        assert!(approx(reg.r_squared, 1.0));
        assert_eq!(reg.model.to_string(), "y=0.050x+3.500");
    }

    #[test]
    fn test_negative_relationship() {
        let records = vec![
            rec("A", 10.0, 7.0),
            rec("B", 50.0, 5.5),
            rec("C", 90.0, 3.0),
            rec("D", 70.0, 4.8),
        ];
        let corr = correlation(&records);
        let reg = regression(&records).unwrap();
        assert!(corr.r < -0.9);
        assert!(reg.model.slope < 0.0);
        assert!(reg.r_squared > 0.8 && reg.r_squared <= 1.0);
    }

    #[test]
    fn test_too_few_records() {
        let corr = correlation(&[rec("A", 50.0, 5.0)]);
        assert_eq!(corr.r, 0.0);
        assert_eq!(
            corr.degeneracy,
            Some(Degeneracy::TooFewRecords { required: 2, available: 1 })
        );
        assert!(regression(&[rec("A", 50.0, 5.0)]).is_none());
        assert_eq!(correlation(&[]).n, 0);
    }

    #[test]
    fn test_zero_variance_fallbacks() {
        let flat_x = vec![rec("A", 50.0, 4.0), rec("B", 50.0, 6.0), rec("C", 50.0, 8.0)];
        let corr = correlation(&flat_x);
        assert_eq!(corr.r, 0.0);
        assert_eq!(corr.degeneracy, Some(Degeneracy::ZeroVariance));

        let reg = regression(&flat_x).unwrap();
        assert_eq!(reg.model.slope, 0.0);
        assert!(approx(reg.model.intercept, 6.0));
        assert_eq!(reg.degeneracy, Some(Degeneracy::ZeroVariance));

        // Identical happiness: SST is zero, so R² is defined as 0
        let flat_y = vec![rec("A", 10.0, 5.0), rec("B", 60.0, 5.0), rec("C", 90.0, 5.0)];
        let reg = regression(&flat_y).unwrap();
        assert_eq!(reg.r_squared, 0.0);
        assert_eq!(correlation(&flat_y).r, 0.0);
    }

    #[test]
    fn test_collinear_r_squared_is_one() {
        let records: Vec<_> = (0..8)
            .map(|i| rec("X", i as f64 * 12.5, 2.0 + 0.04 * i as f64 * 12.5))
            .collect();
        let reg = regression(&records).unwrap();
        assert!(approx(reg.r_squared, 1.0));
        assert!(approx(reg.model.slope, 0.04));
    }

    #[test]
    fn test_equation_with_negative_intercept() {
        let model = RegressionModel { slope: 0.1, intercept: -1.25 };
        assert_eq!(model.to_string(), "y=0.100x-1.250");
        assert!(approx(model.predict(20.0), 0.75));
    }

    #[test]
    fn test_pearson_never_returns_nan() {
        assert_eq!(pearson(&[1.0, f64::NAN, 3.0], &[2.0, 4.0, 6.0]), 0.0);
        assert_eq!(pearson(&[1.0, 2.0, 3.0], &[2.0, f64::INFINITY, 6.0]), 0.0);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
    }

    proptest! {
        #[test]
        fn prop_correlation_symmetric_and_bounded(
            pairs in prop::collection::vec((0.0f64..100.0, 0.0f64..10.0), 1..60)
        ) {
            let xs: Vec<f64> = pairs.iter().map(|p| p.0).collect();
            let ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
            let r = pearson(&xs, &ys);
            prop_assert!((-1.0..=1.0).contains(&r));
            prop_assert!((r - pearson(&ys, &xs)).abs() < 1e-12);
        }

        #[test]
        fn prop_slope_sign_matches_correlation(
            pairs in prop::collection::vec((0.0f64..100.0, 0.0f64..10.0), 2..60)
        ) {
            let records: Vec<_> = pairs.iter().map(|&(x, y)| rec("P", x, y)).collect();
            let r = correlation(&records).r;
            let slope = RegressionModel::fit(&records).unwrap().slope;
            if r.abs() > 1e-9 {
                prop_assert_eq!(r.signum(), slope.signum());
            }
        }

        #[test]
        fn prop_r_squared_at_most_one(
            pairs in prop::collection::vec((0.0f64..100.0, 0.0f64..10.0), 2..60)
        ) {
            let records: Vec<_> = pairs.iter().map(|&(x, y)| rec("P", x, y)).collect();
            let reg = regression(&records).unwrap();
            prop_assert!(reg.r_squared <= 1.0 + 1e-9);
        }
    }
}
