//! Currency display for computed figures.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// How monetary figures are rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyStyle {
    /// `€1.2M`, `€600K`, `€950`.
    #[default]
    Compact,
    /// Whole euros with `.` thousands separators, e.g. `1.234.567 €`.
    Grouped,
}

/// Render `value` in the given style.
pub fn format_currency(value: f64, style: CurrencyStyle) -> String {
    match style {
        CurrencyStyle::Compact => format_compact(value),
        CurrencyStyle::Grouped => format_grouped(value),
    }
}

/// Compact euro display.
///
/// Example:
/// assert_eq!(format_compact(771_561.0), "€772K");
/// assert_eq!(format_compact(1_250_000.0), "€1.3M");
pub fn format_compact(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("€{}M", fixed(value / 1_000_000.0, 1))
    } else if value >= 1_000.0 {
        format!("€{}K", fixed(value / 1_000.0, 0))
    } else {
        format!("€{}", fixed(value, 0))
    }
}

/// Whole-euro display with dot grouping and a trailing euro sign.
pub fn format_grouped(value: f64) -> String {
    // half-way values round towards positive infinity
    let whole = (value + 0.5).floor() as i128;
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    let sign = if whole < 0 { "-" } else { "" };
    format!("{sign}{grouped}\u{a0}€")
}

/// Fixed-point rendering with `dp` decimals, midpoints away from zero.
fn fixed(value: f64, dp: u32) -> String {
    match Decimal::from_f64(value) {
        Some(d) => {
            let mut rounded = d.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
            rounded.rescale(dp);
            rounded.to_string()
        }
        None => format!("{:.*}", dp as usize, value),
    }
}
