#![deny(warnings)]

//! Cost of delay model and its presentation helpers.
//!
//! This crate provides:
//! - The month-by-month compounding cost model over [`CalculatorInput`]
//! - Currency formatting in the compact and grouped display styles
//! - Impact classification, scenario spread and business insights
//! - The export payload produced on user request
//! - Markdown board, ROI and executive-summary documents

mod documents;
mod format;
mod report;

pub use documents::{
    board_presentation, break_even_months, executive_summary, render_report, roi_analysis,
    ReportKind,
};
pub use format::{format_compact, format_currency, format_grouped, CurrencyStyle};
pub use report::{
    build_export, impact_level, insights, scenario_spread, ExportInputs, ExportReport,
    ExportResults, ImpactLevel, Insight, InsightKind, ScenarioSpread,
};

use cod_core::{validate_input, CalculatorInput, CostResult, ValidationError};
use thiserror::Error;

/// Errors produced by the validated cost entry point.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Input failed validation before any arithmetic ran.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),
    /// Arithmetic overflowed to a non-finite figure.
    #[error("non-finite result")]
    NonFinite,
    #[error("unknown report kind: {0:?} (expected board, roi or summary)")]
    UnknownReport(String),
}

/// Compute the cost of delay for one set of inputs.
///
/// The growth term is simulated month by month: month `m` (1-based) earns
/// `monthly_profit * (1 + growth)^(m-1)`. The sum over the delay is what
/// would have been earned under growth; subtracting the linear
/// `direct_loss` leaves the part attributable to growth alone.
///
/// Example:
/// let input = CalculatorInput {
///     revenue: 1e6,
///     margin_percent: 10.0,
///     growth_percent: 0.0,
///     delay_months: 6,
/// };
/// let r = compute_cost(&input);
/// assert_eq!(r.opportunity_cost, 0.0);
pub fn compute_cost(input: &CalculatorInput) -> CostResult {
    let monthly_profit = input.revenue * input.margin_percent / 100.0;
    let direct_loss = monthly_profit * f64::from(input.delay_months);

    let growth_factor = 1.0 + input.growth_percent / 100.0;
    let mut grown = 0.0;
    for month in 1..=input.delay_months {
        grown += monthly_profit * growth_factor.powf(f64::from(month - 1));
    }
    let opportunity_cost = grown - direct_loss;

    CostResult {
        monthly_profit,
        direct_loss,
        opportunity_cost,
        total_cost: direct_loss + opportunity_cost,
    }
}

/// Validated variant of [`compute_cost`] for callers that bypass the ladders.
pub fn try_compute_cost(input: &CalculatorInput) -> Result<CostResult, EconError> {
    validate_input(input)?;
    let result = compute_cost(input);
    if !(result.total_cost.is_finite() && result.opportunity_cost.is_finite()) {
        return Err(EconError::NonFinite);
    }
    Ok(result)
}
