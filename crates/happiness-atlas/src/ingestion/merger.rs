//! Joins the internet-usage and happiness tables on a normalized country key
//!
//! Rows with a missing or unparseable required field are excluded, never
//! raised as errors. Every exclusion is recorded as a [`DroppedRow`] so the
//! data-quality rate stays observable.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::config::{HappinessColumns, InternetColumns, KeyCollisionPolicy, MergeConfig};
use crate::types::{CountryRecord, RawRow, RawValue};

/// Name fixes between the two source tables
pub const BUILTIN_ALIASES: [(&str, &str); 3] = [
    ("DR Congo", "Congo (Kinshasa)"),
    ("Republic of the Congo", "Congo (Brazzaville)"),
    ("Hong Kong", "Hong Kong S.A.R. of China"),
];

/// Country-name alias table
#[derive(Debug, Clone)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
}

impl AliasTable {
    /// The built-in aliases only
    pub fn builtin() -> Self {
        Self::with_extra(&BTreeMap::new())
    }

    /// Built-in aliases plus configured extras; built-ins take precedence
    pub fn with_extra(extra: &BTreeMap<String, String>) -> Self {
        let mut aliases: HashMap<String, String> = extra
            .iter()
            .map(|(from, to)| (from.trim().to_string(), to.trim().to_string()))
            .collect();

        for (from, to) in BUILTIN_ALIASES {
            if let Some(previous) = aliases.insert(from.to_string(), to.to_string()) {
                if previous != to {
                    tracing::warn!(
                        "Ignoring configured alias '{}' -> '{}', built-in maps it to '{}'",
                        from,
                        previous,
                        to
                    );
                }
            }
        }

        Self { aliases }
    }

    /// Trim and apply the alias table
    pub fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        self.aliases
            .get(trimmed)
            .cloned()
            .unwrap_or_else(|| trimmed.to_string())
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Which input table a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTable {
    Internet,
    Happiness,
}

impl std::fmt::Display for SourceTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceTable::Internet => write!(f, "internet"),
            SourceTable::Happiness => write!(f, "happiness"),
        }
    }
}

/// Why a row was excluded from the merged set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    MissingCountry,
    InvalidHappinessScore,
    InvalidUsage,
    NoHappinessMatch,
    InvalidLatitude,
    InvalidLongitude,
    /// Displaced by the key collision policy
    DuplicateCountry,
    /// A pre-merged record carried a NaN or infinite field
    NonFiniteValue,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            DropReason::MissingCountry => "missing country",
            DropReason::InvalidHappinessScore => "invalid happiness score",
            DropReason::InvalidUsage => "invalid internet usage",
            DropReason::NoHappinessMatch => "no happiness match",
            DropReason::InvalidLatitude => "invalid latitude",
            DropReason::InvalidLongitude => "invalid longitude",
            DropReason::DuplicateCountry => "duplicate country",
            DropReason::NonFiniteValue => "non-finite value",
        };
        f.write_str(text)
    }
}

/// A row excluded during the merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedRow {
    pub table: SourceTable,
    /// Zero-based position in its input table
    pub row_index: usize,
    /// Normalized country name, when one could be read
    pub country: Option<String>,
    pub reason: DropReason,
}

/// Merged records plus everything that was excluded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub records: Vec<CountryRecord>,
    pub dropped: Vec<DroppedRow>,
    pub internet_rows: usize,
    pub happiness_rows: usize,
}

impl MergeOutcome {
    /// Number of dropped rows from one table
    pub fn dropped_from(&self, table: SourceTable) -> usize {
        self.dropped.iter().filter(|d| d.table == table).count()
    }

    /// Number of dropped rows with a given reason
    pub fn dropped_for(&self, reason: DropReason) -> usize {
        self.dropped.iter().filter(|d| d.reason == reason).count()
    }

    /// Share of internet rows that made it into the merged set
    pub fn match_rate(&self) -> f64 {
        if self.internet_rows == 0 {
            0.0
        } else {
            self.records.len() as f64 / self.internet_rows as f64
        }
    }
}

/// Row merger
#[derive(Debug, Clone)]
pub struct RowMerger {
    aliases: AliasTable,
    internet_columns: InternetColumns,
    happiness_columns: HappinessColumns,
    policy: KeyCollisionPolicy,
}

impl Default for RowMerger {
    fn default() -> Self {
        Self::from_config(&MergeConfig::default())
    }
}

impl RowMerger {
    /// Create a merger from configuration
    pub fn from_config(config: &MergeConfig) -> Self {
        Self {
            aliases: AliasTable::with_extra(&config.extra_aliases),
            internet_columns: config.internet_columns.clone(),
            happiness_columns: config.happiness_columns.clone(),
            policy: config.collision_policy,
        }
    }

    /// Override the key collision policy
    pub fn with_policy(mut self, policy: KeyCollisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Join the two tables. Output order follows the internet table.
    pub fn merge(&self, internet: &[RawRow], happiness: &[RawRow]) -> MergeOutcome {
        let mut dropped = Vec::new();
        let lookup = self.happiness_lookup(happiness, &mut dropped);

        // Slots keep input order; a `last_wins` collision empties the earlier slot
        let mut slots: Vec<Option<(usize, CountryRecord)>> = Vec::new();
        let mut slot_of: HashMap<String, usize> = HashMap::new();

        for (row_index, row) in internet.iter().enumerate() {
            let record = match self.internet_record(row, &lookup) {
                Ok(record) => record,
                Err((country, reason)) => {
                    dropped.push(DroppedRow {
                        table: SourceTable::Internet,
                        row_index,
                        country,
                        reason,
                    });
                    continue;
                }
            };

            match (self.policy, slot_of.get(&record.country).copied()) {
                (KeyCollisionPolicy::FirstWins, Some(_)) => {
                    dropped.push(DroppedRow {
                        table: SourceTable::Internet,
                        row_index,
                        country: Some(record.country),
                        reason: DropReason::DuplicateCountry,
                    });
                }
                (KeyCollisionPolicy::LastWins, Some(slot)) => {
                    if let Some((earlier_index, earlier)) = slots[slot].take() {
                        dropped.push(DroppedRow {
                            table: SourceTable::Internet,
                            row_index: earlier_index,
                            country: Some(earlier.country),
                            reason: DropReason::DuplicateCountry,
                        });
                    }
                    slot_of.insert(record.country.clone(), slots.len());
                    slots.push(Some((row_index, record)));
                }
                _ => {
                    slot_of.insert(record.country.clone(), slots.len());
                    slots.push(Some((row_index, record)));
                }
            }
        }

        dropped.sort_by_key(|d| (d.table, d.row_index));
        for row in &dropped {
            tracing::debug!(
                "Dropped {} row {} ({}): {}",
                row.table,
                row.row_index,
                row.country.as_deref().unwrap_or("?"),
                row.reason
            );
        }

        let outcome = MergeOutcome {
            records: slots.into_iter().flatten().map(|(_, r)| r).collect(),
            dropped,
            internet_rows: internet.len(),
            happiness_rows: happiness.len(),
        };

        tracing::info!(
            "Merged {} countries ({} internet rows dropped, {} happiness rows dropped)",
            outcome.records.len(),
            outcome.dropped_from(SourceTable::Internet),
            outcome.dropped_from(SourceTable::Happiness)
        );

        outcome
    }

    /// Normalized country -> (ladder score, row index)
    ///
    /// A repeated country keeps its last score whatever the policy; the
    /// policy only governs the internet side.
    fn happiness_lookup(
        &self,
        happiness: &[RawRow],
        dropped: &mut Vec<DroppedRow>,
    ) -> HashMap<String, (f64, usize)> {
        let cols = &self.happiness_columns;
        let mut lookup: HashMap<String, (f64, usize)> = HashMap::new();

        for (row_index, row) in happiness.iter().enumerate() {
            let Some(raw_name) = cell(row, &cols.country).and_then(RawValue::as_text) else {
                dropped.push(DroppedRow {
                    table: SourceTable::Happiness,
                    row_index,
                    country: None,
                    reason: DropReason::MissingCountry,
                });
                continue;
            };
            let country = self.aliases.normalize(&raw_name);

            let Some(score) = cell(row, &cols.score).and_then(RawValue::as_f64) else {
                dropped.push(DroppedRow {
                    table: SourceTable::Happiness,
                    row_index,
                    country: Some(country),
                    reason: DropReason::InvalidHappinessScore,
                });
                continue;
            };

            match lookup.get(&country).copied() {
                None => {
                    lookup.insert(country, (score, row_index));
                }
                Some((_, earlier_index)) => {
                    lookup.insert(country.clone(), (score, row_index));
                    dropped.push(DroppedRow {
                        table: SourceTable::Happiness,
                        row_index: earlier_index,
                        country: Some(country),
                        reason: DropReason::DuplicateCountry,
                    });
                }
            }
        }

        lookup
    }

    fn internet_record(
        &self,
        row: &RawRow,
        lookup: &HashMap<String, (f64, usize)>,
    ) -> std::result::Result<CountryRecord, (Option<String>, DropReason)> {
        let cols = &self.internet_columns;

        let raw_name = cell(row, &cols.country)
            .and_then(RawValue::as_text)
            .ok_or((None, DropReason::MissingCountry))?;
        let country = self.aliases.normalize(&raw_name);

        let fail = |reason: DropReason| (Some(country.clone()), reason);

        let usage = cell(row, &cols.usage_percent)
            .and_then(RawValue::as_f64)
            .ok_or_else(|| fail(DropReason::InvalidUsage))?;
        let (happiness, _) = lookup
            .get(&country)
            .copied()
            .ok_or_else(|| fail(DropReason::NoHappinessMatch))?;
        let latitude = cell(row, &cols.latitude)
            .and_then(RawValue::as_f64)
            .ok_or_else(|| fail(DropReason::InvalidLatitude))?;
        let longitude = cell(row, &cols.longitude)
            .and_then(RawValue::as_f64)
            .ok_or_else(|| fail(DropReason::InvalidLongitude))?;

        Ok(CountryRecord::new(country, usage, happiness, latitude, longitude))
    }
}

fn cell<'a>(row: &'a RawRow, column: &str) -> Option<&'a RawValue> {
    row.get(column)
}
