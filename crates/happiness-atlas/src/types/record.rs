//! Raw input rows and merged country records

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single cell of an input table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Already-typed number (JSON input)
    Number(f64),
    /// Text cell (CSV input, or quoted JSON)
    Text(String),
    /// Explicit null / missing cell
    Null,
    /// Any other JSON value (bool, array, object); never coerces
    Other(serde_json::Value),
}

impl RawValue {
    /// Coerce to a finite float using the standard parser on trimmed text
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            RawValue::Number(n) => *n,
            RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
            RawValue::Null | RawValue::Other(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Coerce to trimmed, non-empty text
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            // Integral numbers print without a trailing ".0"
            RawValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            RawValue::Number(n) if n.is_finite() => Some(n.to_string()),
            _ => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

/// One row of an input table, keyed by column name
pub type RawRow = HashMap<String, RawValue>;

/// Build a raw row from `(column, value)` pairs
pub fn raw_row<K, V, I>(cells: I) -> RawRow
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<RawValue>,
{
    cells
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Outcome of the local slope estimate for one record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocalSlope {
    /// Weighted least-squares slope over the neighbourhood
    Estimated { slope: f64, neighbors: usize },
    /// Too few neighbours within the bandwidth
    InsufficientNeighbors { neighbors: usize },
    /// Normal equations near-singular (e.g. a single distinct internet value)
    IllConditioned { neighbors: usize },
}

impl LocalSlope {
    /// The slope, if one was estimated
    pub fn value(&self) -> Option<f64> {
        match self {
            LocalSlope::Estimated { slope, .. } => Some(*slope),
            _ => None,
        }
    }

    /// Neighbour count the outcome was based on
    pub fn neighbors(&self) -> usize {
        match self {
            LocalSlope::Estimated { neighbors, .. }
            | LocalSlope::InsufficientNeighbors { neighbors }
            | LocalSlope::IllConditioned { neighbors } => *neighbors,
        }
    }
}

/// One merged country row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRecord {
    /// Canonical country name after alias normalization
    pub country: String,
    /// Share of population using the internet (0-100)
    pub internet_usage_percent: f64,
    /// Ladder score (typically 0-10)
    pub happiness_score: f64,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Cluster index, once clustering has run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<usize>,
    /// Local slope outcome; `None` means not computed yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_slope: Option<LocalSlope>,
}

impl CountryRecord {
    /// Create a record with no derived fields
    pub fn new(
        country: impl Into<String>,
        internet_usage_percent: f64,
        happiness_score: f64,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            country: country.into(),
            internet_usage_percent,
            happiness_score,
            latitude,
            longitude,
            cluster_id: None,
            local_slope: None,
        }
    }

    /// All four required numeric fields are finite
    pub fn is_complete(&self) -> bool {
        self.internet_usage_percent.is_finite()
            && self.happiness_score.is_finite()
            && self.latitude.is_finite()
            && self.longitude.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_f64_coercion() {
        assert_eq!(RawValue::from(" 89.4 ").as_f64(), Some(89.4));
        assert_eq!(RawValue::from("0").as_f64(), Some(0.0));
        assert_eq!(RawValue::from(7.5).as_f64(), Some(7.5));
        assert_eq!(RawValue::from("").as_f64(), None);
        assert_eq!(RawValue::from("n/a").as_f64(), None);
        assert_eq!(RawValue::from("NaN").as_f64(), None);
        assert_eq!(RawValue::from("inf").as_f64(), None);
        assert_eq!(RawValue::Null.as_f64(), None);
    }

    #[test]
    fn test_as_text_coercion() {
        assert_eq!(RawValue::from("  Chile ").as_text().as_deref(), Some("Chile"));
        assert_eq!(RawValue::from("   ").as_text(), None);
        assert_eq!(RawValue::from(2024.0).as_text().as_deref(), Some("2024"));
        assert_eq!(RawValue::from(1.5).as_text().as_deref(), Some("1.5"));
        assert_eq!(RawValue::Null.as_text(), None);
    }

    #[test]
    fn test_raw_value_from_json() {
        let rows: Vec<RawRow> =
            serde_json::from_str(r#"[{"Country": "Peru", "Ladder score": 5.8, "Note": null}]"#)
                .unwrap();
        assert_eq!(rows[0]["Country"], RawValue::Text("Peru".into()));
        assert_eq!(rows[0]["Ladder score"], RawValue::Number(5.8));
        assert_eq!(rows[0]["Note"], RawValue::Null);
    }

    #[test]
    fn test_non_scalar_json_cells_never_coerce() {
        let rows: Vec<RawRow> = serde_json::from_str(
            r#"[{"Country": "Peru", "oecd": true, "tags": ["andes"], "meta": {"iso": "PE"}}]"#,
        )
        .unwrap();
        assert_eq!(rows[0]["oecd"], RawValue::Other(serde_json::Value::Bool(true)));
        for column in ["oecd", "tags", "meta"] {
            assert_eq!(rows[0][column].as_f64(), None);
            assert_eq!(rows[0][column].as_text(), None);
        }
    }

    #[test]
    fn test_local_slope_serialization() {
        let slope = LocalSlope::Estimated { slope: 0.02, neighbors: 7 };
        let json = serde_json::to_value(slope).unwrap();
        assert_eq!(json["status"], "estimated");
        assert_eq!(slope.value(), Some(0.02));

        let null = LocalSlope::IllConditioned { neighbors: 6 };
        assert_eq!(null.value(), None);
        assert_eq!(null.neighbors(), 6);
    }
}
