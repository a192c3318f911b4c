//! Derived views over computed results: impact, scenario spread, insights
//! and the export payload.

use crate::format::{format_currency, CurrencyStyle};
use chrono::{DateTime, SecondsFormat, Utc};
use cod_core::{CalculatorInput, CostResult};
use serde::{Deserialize, Serialize};

/// Severity band of a total cost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

/// Classify a total cost: `High` from 1M, `Medium` from 100K.
pub fn impact_level(total_cost: f64) -> ImpactLevel {
    if total_cost >= 1_000_000.0 {
        ImpactLevel::High
    } else if total_cost >= 100_000.0 {
        ImpactLevel::Medium
    } else {
        ImpactLevel::Low
    }
}

/// Lowest, median and highest total cost across explored scenarios.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpread {
    pub conservative: f64,
    pub median: f64,
    pub aggressive: f64,
}

/// Needs at least three results; the median is the upper middle element.
pub fn scenario_spread(results: &[CostResult]) -> Option<ScenarioSpread> {
    if results.len() < 3 {
        return None;
    }
    let mut totals: Vec<f64> = results.iter().map(|r| r.total_cost).collect();
    totals.sort_by(f64::total_cmp);
    Some(ScenarioSpread {
        conservative: totals[0],
        median: totals[totals.len() / 2],
        aggressive: totals[totals.len() - 1],
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Education,
    Strategic,
    Warning,
}

/// A contextual note shown next to the result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub message: &'static str,
}

/// Insights triggered by the current inputs, in display order.
pub fn insights(input: &CalculatorInput) -> Vec<Insight> {
    let mut out = Vec::new();
    if input.revenue > 5_000_000.0 {
        out.push(Insight {
            kind: InsightKind::Education,
            message: "Enterprise insight: at this revenue scale, even short delays can move \
                      quarterly results significantly.",
        });
    }
    if input.growth_percent > 20.0 {
        out.push(Insight {
            kind: InsightKind::Strategic,
            message: "Growth insight: high-growth scenarios compound delay costs, so time \
                      becomes the scarcest resource.",
        });
    }
    if input.delay_months > 12 {
        out.push(Insight {
            kind: InsightKind::Warning,
            message: "Strategic warning: extended delays often point to organizational \
                      problems beyond timing.",
        });
    }
    out
}

/// Formatted inputs as they appear in an export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportInputs {
    pub monthly_revenue: String,
    pub profit_margin: String,
    pub growth_rate: String,
    pub delay_period: String,
}

/// Formatted result figures as they appear in an export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResults {
    pub total_cost_of_delay: String,
    pub monthly_profit: String,
    pub direct_loss: String,
    pub opportunity_cost: String,
}

/// User-requested summary document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportReport {
    /// ISO-8601 UTC timestamp with millisecond precision.
    pub timestamp: String,
    pub inputs: ExportInputs,
    pub results: ExportResults,
}

/// `"1 month"`, `"6 months"`.
pub(crate) fn delay_label(months: u32) -> String {
    let unit = if months == 1 { "month" } else { "months" };
    format!("{months} {unit}")
}

/// Build the export document for one calculation.
pub fn build_export(
    input: &CalculatorInput,
    result: &CostResult,
    style: CurrencyStyle,
    at: DateTime<Utc>,
) -> ExportReport {
    ExportReport {
        timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        inputs: ExportInputs {
            monthly_revenue: format_currency(input.revenue, style),
            profit_margin: format!("{}%", input.margin_percent),
            growth_rate: format!("{}%", input.growth_percent),
            delay_period: delay_label(input.delay_months),
        },
        results: ExportResults {
            total_cost_of_delay: format_currency(result.total_cost, style),
            monthly_profit: format_currency(result.monthly_profit, style),
            direct_loss: format_currency(result.direct_loss, style),
            opportunity_cost: format_currency(result.opportunity_cost, style),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute_cost;
    use chrono::TimeZone;

    fn sample() -> CalculatorInput {
        CalculatorInput {
            revenue: 1_000_000.0,
            margin_percent: 10.0,
            growth_percent: 10.0,
            delay_months: 6,
        }
    }

    #[test]
    fn impact_bands() {
        assert_eq!(impact_level(1_000_000.0), ImpactLevel::High);
        assert_eq!(impact_level(999_999.0), ImpactLevel::Medium);
        assert_eq!(impact_level(100_000.0), ImpactLevel::Medium);
        assert_eq!(impact_level(99_999.0), ImpactLevel::Low);
    }

    #[test]
    fn spread_requires_three_results() {
        let r = compute_cost(&sample());
        assert!(scenario_spread(&[r, r]).is_none());
    }

    #[test]
    fn spread_picks_min_median_max() {
        let mk = |delay| compute_cost(&CalculatorInput { delay_months: delay, ..sample() });
        let results = [mk(24), mk(1), mk(6), mk(3)];
        let s = scenario_spread(&results).unwrap();
        assert_eq!(s.conservative, mk(1).total_cost);
        // sorted: 1, 3, 6, 24 -> index 2
        assert_eq!(s.median, mk(6).total_cost);
        assert_eq!(s.aggressive, mk(24).total_cost);
    }

    #[test]
    fn insights_follow_thresholds() {
        assert!(insights(&sample()).is_empty());
        let hot = CalculatorInput {
            revenue: 10_000_000.0,
            growth_percent: 25.0,
            delay_months: 24,
            ..sample()
        };
        let kinds: Vec<_> = insights(&hot).iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![InsightKind::Education, InsightKind::Strategic, InsightKind::Warning]
        );
        let edge = CalculatorInput { revenue: 5_000_000.0, delay_months: 12, ..sample() };
        assert!(insights(&edge).is_empty());
    }

    #[test]
    fn export_formats_inputs_and_results() {
        let input = sample();
        let result = compute_cost(&input);
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap();
        let report = build_export(&input, &result, CurrencyStyle::Compact, at);
        assert_eq!(report.timestamp, "2026-10-17T09:30:00.000Z");
        assert_eq!(report.inputs.monthly_revenue, "€1.0M");
        assert_eq!(report.inputs.profit_margin, "10%");
        assert_eq!(report.inputs.growth_rate, "10%");
        assert_eq!(report.inputs.delay_period, "6 months");
        assert_eq!(report.results.monthly_profit, "€100K");
        assert_eq!(report.results.direct_loss, "€600K");
        assert_eq!(report.results.opportunity_cost, "€172K");
        assert_eq!(report.results.total_cost_of_delay, "€772K");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["results"]["totalCostOfDelay"], "€772K");
        assert_eq!(json["inputs"]["delayPeriod"], "6 months");
    }

    #[test]
    fn export_uses_singular_month() {
        let input = CalculatorInput { delay_months: 1, ..sample() };
        let at = Utc.timestamp_millis_opt(0).unwrap();
        let report = build_export(&input, &compute_cost(&input), CurrencyStyle::Grouped, at);
        assert_eq!(report.inputs.delay_period, "1 month");
        assert_eq!(report.results.total_cost_of_delay, "100.000\u{a0}€");
        assert_eq!(report.timestamp, "1970-01-01T00:00:00.000Z");
    }
}
