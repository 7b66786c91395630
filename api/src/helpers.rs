//! Shared helpers for turning model probabilities into display strings.
//!
//! Percentages are rounded to one decimal place with the midpoint rounded
//! away from zero, on the decimal value of the probability. Going through
//! `Decimal` keeps the result stable for values like `0.1225` whose binary
//! representation sits just below the midpoint.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Format a probability in `[0, 1]` as a percentage with one decimal place,
/// e.g. `0.1523` → `"15.2%"`.
pub(crate) fn probability_to_percent(p: f64) -> String {
    let d = Decimal::from_f64(p).unwrap_or_else(|| {
        tracing::warn!(
            "probability_to_percent received non-finite value {}, defaulting to 0",
            p
        );
        Decimal::ZERO
    });
    decimal_to_percent(d)
}

/// Same as [`probability_to_percent`] for an exact decimal probability.
pub(crate) fn decimal_to_percent(p: Decimal) -> String {
    let pct = (p * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.1}%", pct)
}
