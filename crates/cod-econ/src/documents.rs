//! Markdown documents for sharing a calculation: board deck notes, ROI
//! analysis and a one-screen executive summary.

use crate::format::{format_currency, CurrencyStyle};
use crate::report::delay_label;
use crate::EconError;
use chrono::{DateTime, NaiveDate, Utc};
use cod_core::{CalculatorInput, CostResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Board,
    Roi,
    Summary,
}

impl ReportKind {
    pub const ALL: [ReportKind; 3] = [ReportKind::Board, ReportKind::Roi, ReportKind::Summary];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::Board => "board",
            ReportKind::Roi => "roi",
            ReportKind::Summary => "summary",
        }
    }

    /// Suggested download name.
    pub fn file_name(self) -> &'static str {
        match self {
            ReportKind::Board => "board-presentation.md",
            ReportKind::Roi => "roi-analysis.md",
            ReportKind::Summary => "executive-summary.md",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = EconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| EconError::UnknownReport(s.to_string()))
    }
}

/// Months of profit needed to cover the total cost, rounded up.
///
/// `None` when there is no positive monthly profit to recover with.
pub fn break_even_months(result: &CostResult) -> Option<u64> {
    if result.monthly_profit <= 0.0 {
        return None;
    }
    let months = (result.total_cost / result.monthly_profit).ceil();
    if months.is_finite() && months >= 0.0 {
        Some(months as u64)
    } else {
        None
    }
}

fn percent(value: f64) -> String {
    format!("{value:.1}%")
}

fn break_even_label(result: &CostResult) -> String {
    match break_even_months(result) {
        Some(months) => format!("{months} months"),
        None => "n/a".to_string(),
    }
}

pub fn board_presentation(
    input: &CalculatorInput,
    result: &CostResult,
    style: CurrencyStyle,
) -> String {
    let money = |v: f64| format_currency(v, style);
    format!(
        "# Executive Board Presentation: Cost of Delay Analysis

## Key Findings
- **Monthly Revenue Impact**: {revenue}
- **Net Profit Margin**: {margin}
- **Expected Growth Rate**: {growth}
- **Delay Period**: {delay}

## Financial Impact
- **Monthly Profit Loss**: {profit}
- **Direct Revenue Loss**: {direct}
- **Opportunity Cost**: {opportunity}
- **Total Cost of Delay**: {total}

## Strategic Recommendation
The analysis indicates a significant financial impact from project delays. \
Consider prioritizing resource allocation to minimize time-to-market.
",
        revenue = money(input.revenue),
        margin = percent(input.margin_percent),
        growth = percent(input.growth_percent),
        delay = delay_label(input.delay_months),
        profit = money(result.monthly_profit),
        direct = money(result.direct_loss),
        opportunity = money(result.opportunity_cost),
        total = money(result.total_cost),
    )
}

pub fn roi_analysis(
    input: &CalculatorInput,
    result: &CostResult,
    style: CurrencyStyle,
    generated: NaiveDate,
) -> String {
    let money = |v: f64| format_currency(v, style);
    format!(
        "# ROI Analysis: Cost of Delay

Generated: {generated}

## Investment Scenario
- Monthly Revenue Potential: {revenue}
- Profit Margin: {margin}
- Growth Assumptions: {growth} monthly

## Cost Analysis
1. Direct Loss: {direct}
2. Opportunity Cost: {opportunity}
3. Total Impact: {total}

## ROI Calculation
Break-even timeline: {break_even}
Recommended action: Accelerate development to minimize delay costs
",
        generated = generated.format("%Y-%m-%d"),
        revenue = money(input.revenue),
        margin = percent(input.margin_percent),
        growth = percent(input.growth_percent),
        direct = money(result.direct_loss),
        opportunity = money(result.opportunity_cost),
        total = money(result.total_cost),
        break_even = break_even_label(result),
    )
}

pub fn executive_summary(
    input: &CalculatorInput,
    result: &CostResult,
    style: CurrencyStyle,
) -> String {
    let money = |v: f64| format_currency(v, style);
    format!(
        "# Executive Summary: Cost of Delay

**Bottom Line**: Delaying this {months}-month project costs {total}

**Key Numbers**:
- Monthly profit impact: {profit}
- Total delay cost: {total}
- Break-even period: {break_even}

**Recommendation**: Prioritize immediate action to minimize financial impact.
",
        months = input.delay_months,
        total = money(result.total_cost),
        profit = money(result.monthly_profit),
        break_even = break_even_label(result),
    )
}

/// Render `kind`; `at` dates the ROI analysis.
pub fn render_report(
    kind: ReportKind,
    input: &CalculatorInput,
    result: &CostResult,
    style: CurrencyStyle,
    at: DateTime<Utc>,
) -> String {
    match kind {
        ReportKind::Board => board_presentation(input, result, style),
        ReportKind::Roi => roi_analysis(input, result, style, at.date_naive()),
        ReportKind::Summary => executive_summary(input, result, style),
    }
}
