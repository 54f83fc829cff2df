//! Canned plain-language reading of the correlation and residuals

use std::fmt;

use serde::{Deserialize, Serialize};

use super::residuals::{ResidualEntry, ResidualRanking};

/// Verbal strength band on |r|
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthBand {
    VeryWeak,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl StrengthBand {
    /// Band for a correlation magnitude; each bound is exclusive
    pub fn from_abs(abs_r: f64) -> Self {
        if abs_r < 0.2 {
            StrengthBand::VeryWeak
        } else if abs_r < 0.4 {
            StrengthBand::Weak
        } else if abs_r < 0.6 {
            StrengthBand::Moderate
        } else if abs_r < 0.8 {
            StrengthBand::Strong
        } else {
            StrengthBand::VeryStrong
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StrengthBand::VeryWeak => "very weak",
            StrengthBand::Weak => "weak",
            StrengthBand::Moderate => "moderate",
            StrengthBand::Strong => "strong",
            StrengthBand::VeryStrong => "very strong",
        }
    }
}

impl fmt::Display for StrengthBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Sign of the relationship; zero counts as positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    pub fn of(r: f64) -> Self {
        if r >= 0.0 {
            Direction::Positive
        } else {
            Direction::Negative
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Positive => "positive",
            Direction::Negative => "negative",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub r: f64,
    pub band: StrengthBand,
    pub direction: Direction,
    pub sentence: String,
    /// Countries furthest above the regression line
    pub above_line: Vec<String>,
    /// Countries furthest below the regression line
    pub below_line: Vec<String>,
    /// `None` when no residual ranking was available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_summary: Option<String>,
}

fn countries(entries: &[ResidualEntry]) -> Vec<String> {
    entries.iter().map(|e| e.country.clone()).collect()
}

/// Build the interpretation for a correlation and optional residual extremes
pub fn interpret(r: f64, residuals: Option<&ResidualRanking>) -> Interpretation {
    let band = StrengthBand::from_abs(r.abs());
    let direction = Direction::of(r);
    let tendency = match direction {
        Direction::Positive => "to go with higher",
        Direction::Negative => "NOT to go with higher",
    };

    let sentence = format!(
        "Pearson correlation = {:.3} ({} {}). Higher internet use tends {} happiness on average. \
         This does NOT prove cause (spurious correlation risk).",
        r, band, direction, tendency
    );

    let above_line = residuals.map(|ranking| countries(&ranking.most_positive)).unwrap_or_default();
    let below_line = residuals.map(|ranking| countries(&ranking.most_negative)).unwrap_or_default();
    let pattern_summary = residuals.map(|_| {
        format!(
            "Countries above line (examples): {} | Below line: {}",
            above_line.join(", "),
            below_line.join(", ")
        )
    });

    Interpretation {
        r,
        band,
        direction,
        sentence,
        above_line,
        below_line,
        pattern_summary,
    }
}
