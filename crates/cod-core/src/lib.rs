#![deny(warnings)]

//! Core domain models and invariants for the Cost of Delay calculator.
//!
//! This crate defines the slider ladders, the calculator input and result
//! types, and the usage counters consumed by the achievement layer, together
//! with validation helpers that keep library callers away from NaN/Infinity.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Slider position every parameter starts at.
pub const DEFAULT_POSITION: usize = 2;

/// Upper bound accepted for monthly revenue by [`validate_input`].
pub const MAX_REVENUE: f64 = 1e15;
/// Upper bound accepted for the profit margin, in percent.
pub const MAX_MARGIN_PERCENT: f64 = 100.0;
/// Upper bound accepted for the monthly growth rate, in percent.
pub const MAX_GROWTH_PERCENT: f64 = 1000.0;
/// Upper bound accepted for the delay period, in months.
pub const MAX_DELAY_MONTHS: u32 = 120;

/// One of the four calculator inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    /// Monthly revenue in euros.
    Revenue,
    /// Profit margin in percent.
    Margin,
    /// Monthly growth rate in percent.
    Growth,
    /// Delay period in months.
    Delay,
}

impl Parameter {
    /// All parameters in display order.
    pub const ALL: [Parameter; 4] = [
        Parameter::Revenue,
        Parameter::Margin,
        Parameter::Growth,
        Parameter::Delay,
    ];

    /// Stable lowercase key, e.g. `"revenue"`.
    pub fn key(self) -> &'static str {
        match self {
            Parameter::Revenue => "revenue",
            Parameter::Margin => "margin",
            Parameter::Growth => "growth",
            Parameter::Delay => "delay",
        }
    }

    /// The fixed ladder this parameter selects from.
    pub fn ladder(self) -> &'static Ladder {
        match self {
            Parameter::Revenue => &REVENUE_LADDER,
            Parameter::Margin => &MARGIN_LADDER,
            Parameter::Growth => &GROWTH_LADDER,
            Parameter::Delay => &DELAY_LADDER,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A fixed, ordered set of selectable values with their display labels.
#[derive(Debug)]
pub struct Ladder {
    /// Ladder values, ascending.
    pub values: &'static [f64],
    /// One label per value.
    pub labels: &'static [&'static str],
}

impl Ladder {
    /// Number of steps on the ladder.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the ladder has no steps.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`, if it exists.
    pub fn value(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Label at `index`, if it exists.
    pub fn label(&self, index: usize) -> Option<&'static str> {
        self.labels.get(index).copied()
    }

    /// Index of an exact ladder member.
    pub fn position_of(&self, value: f64) -> Option<usize> {
        self.values.iter().position(|v| *v == value)
    }
}

pub static REVENUE_LADDER: Ladder = Ladder {
    values: &[100_000.0, 500_000.0, 1_000_000.0, 5_000_000.0, 10_000_000.0],
    labels: &["€0.1M", "€0.5M", "€1.0M", "€5.0M", "€10M"],
};

pub static MARGIN_LADDER: Ladder = Ladder {
    values: &[1.0, 2.0, 5.0, 10.0, 25.0],
    labels: &["1%", "2%", "5%", "10%", "25%"],
};

pub static GROWTH_LADDER: Ladder = Ladder {
    values: &[2.0, 5.0, 10.0, 15.0, 25.0, 50.0],
    labels: &["2%", "5%", "10%", "15%", "25%", "50%"],
};

pub static DELAY_LADDER: Ladder = Ladder {
    values: &[1.0, 3.0, 6.0, 12.0, 24.0],
    labels: &["1m", "3m", "6m", "1y", "2y"],
};

/// Slider indices owned by the presentation shell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliderPositions {
    pub revenue: usize,
    pub margin: usize,
    pub growth: usize,
    pub delay: usize,
}

impl Default for SliderPositions {
    fn default() -> Self {
        Self {
            revenue: DEFAULT_POSITION,
            margin: DEFAULT_POSITION,
            growth: DEFAULT_POSITION,
            delay: DEFAULT_POSITION,
        }
    }
}

impl SliderPositions {
    /// Current index for a parameter.
    pub fn get(&self, parameter: Parameter) -> usize {
        match parameter {
            Parameter::Revenue => self.revenue,
            Parameter::Margin => self.margin,
            Parameter::Growth => self.growth,
            Parameter::Delay => self.delay,
        }
    }

    /// Move a slider. Out-of-ladder indices are rejected and leave state unchanged.
    pub fn set(&mut self, parameter: Parameter, index: usize) -> Result<(), ValidationError> {
        check_index(parameter, index)?;
        match parameter {
            Parameter::Revenue => self.revenue = index,
            Parameter::Margin => self.margin = index,
            Parameter::Growth => self.growth = index,
            Parameter::Delay => self.delay = index,
        }
        Ok(())
    }

    /// Resolve indices into ladder values.
    pub fn to_input(&self) -> Result<CalculatorInput, ValidationError> {
        let value = |p: Parameter| -> Result<f64, ValidationError> {
            let index = self.get(p);
            p.ladder().value(index).ok_or(ValidationError::IndexOutOfRange {
                parameter: p,
                index,
                len: p.ladder().len(),
            })
        };
        Ok(CalculatorInput {
            revenue: value(Parameter::Revenue)?,
            margin_percent: value(Parameter::Margin)?,
            growth_percent: value(Parameter::Growth)?,
            delay_months: value(Parameter::Delay)? as u32,
        })
    }
}

fn check_index(parameter: Parameter, index: usize) -> Result<(), ValidationError> {
    let len = parameter.ladder().len();
    if index >= len {
        return Err(ValidationError::IndexOutOfRange {
            parameter,
            index,
            len,
        });
    }
    Ok(())
}

/// The four values the cost model consumes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalculatorInput {
    /// Monthly revenue in euros.
    pub revenue: f64,
    /// Profit margin in percent (10 = 10%).
    pub margin_percent: f64,
    /// Monthly growth rate in percent.
    pub growth_percent: f64,
    /// Delay period in whole months.
    pub delay_months: u32,
}

impl CalculatorInput {
    /// Value of a single parameter, as tracked by the usage counters.
    pub fn value(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::Revenue => self.revenue,
            Parameter::Margin => self.margin_percent,
            Parameter::Growth => self.growth_percent,
            Parameter::Delay => f64::from(self.delay_months),
        }
    }

    /// Whether every value is an exact member of its ladder.
    pub fn on_ladders(&self) -> bool {
        Parameter::ALL
            .iter()
            .all(|p| p.ladder().position_of(self.value(*p)).is_some())
    }
}

/// Derived monetary figures. Recomputed in full on every input change.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostResult {
    /// Profit per month at the current run-rate.
    pub monthly_profit: f64,
    /// Linear loss over the delay, ignoring growth.
    pub direct_loss: f64,
    /// Additional loss attributable to compounding growth.
    pub opportunity_cost: f64,
    /// `direct_loss + opportunity_cost`.
    pub total_cost: f64,
}

/// Running counters and maxima that drive achievement unlocks.
///
/// Missing fields deserialize to zero so older saves merge cleanly.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStats {
    pub calculations_completed: u64,
    pub revenue_changes: u64,
    pub margin_changes: u64,
    pub growth_changes: u64,
    pub delay_changes: u64,
    pub max_revenue_tested: f64,
    pub max_cost_discovered: f64,
    pub max_delay_tested: f64,
    pub max_margin_tested: f64,
    pub max_growth_tested: f64,
    /// Epoch milliseconds at which tracking (re)started.
    pub session_start: i64,
    pub total_interactions: u64,
}

impl UserStats {
    /// Fresh stats starting at `session_start` (epoch ms).
    pub fn new(session_start: i64) -> Self {
        Self {
            session_start,
            ..Self::default()
        }
    }

    /// Sum of all slider change counters.
    pub fn total_changes(&self) -> u64 {
        self.revenue_changes + self.margin_changes + self.growth_changes + self.delay_changes
    }

    /// Change counter for one parameter.
    pub fn changes(&self, parameter: Parameter) -> u64 {
        match parameter {
            Parameter::Revenue => self.revenue_changes,
            Parameter::Margin => self.margin_changes,
            Parameter::Growth => self.growth_changes,
            Parameter::Delay => self.delay_changes,
        }
    }

    /// Running maximum for one parameter.
    pub fn max_tested(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::Revenue => self.max_revenue_tested,
            Parameter::Margin => self.max_margin_tested,
            Parameter::Growth => self.max_growth_tested,
            Parameter::Delay => self.max_delay_tested,
        }
    }
}

/// Validation errors for calculator inputs.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Numeric field must be finite.
    #[error("{0} must be finite")]
    NonFinite(&'static str),
    /// Field must be non-negative.
    #[error("{0} must not be negative")]
    Negative(&'static str),
    /// Field is far outside anything the ladders can produce.
    #[error("{field} = {value} exceeds the supported maximum {max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        max: f64,
    },
    /// Slider index past the end of its ladder.
    #[error("{parameter} slider index {index} is out of range (ladder has {len} steps)")]
    IndexOutOfRange {
        parameter: Parameter,
        index: usize,
        len: usize,
    },
}

fn check_amount(field: &'static str, value: f64, max: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite(field));
    }
    if value < 0.0 {
        return Err(ValidationError::Negative(field));
    }
    if value > max {
        return Err(ValidationError::OutOfRange { field, value, max });
    }
    Ok(())
}

/// Validate calculator input for library callers that bypass the ladders.
pub fn validate_input(input: &CalculatorInput) -> Result<(), ValidationError> {
    check_amount("revenue", input.revenue, MAX_REVENUE)?;
    check_amount("margin_percent", input.margin_percent, MAX_MARGIN_PERCENT)?;
    check_amount("growth_percent", input.growth_percent, MAX_GROWTH_PERCENT)?;
    if input.delay_months > MAX_DELAY_MONTHS {
        return Err(ValidationError::OutOfRange {
            field: "delay_months",
            value: f64::from(input.delay_months),
            max: f64::from(MAX_DELAY_MONTHS),
        });
    }
    Ok(())
}
