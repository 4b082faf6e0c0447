//! Infection ratio.

/// Returns `total / population` as a fraction.
///
/// `None` when the population is unknown or zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn infected_fraction(total: u64, population: Option<u64>) -> Option<f64> {
    match population {
        Some(population) if population > 0 => Some(total as f64 / population as f64),
        _ => None,
    }
}
