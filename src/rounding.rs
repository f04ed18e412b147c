//! Price bounds and rounding shared by every strategy.

use crate::context::{get_f64, Fields};

/// Clamps `price` into `[min, max]`.  A bound of exactly zero (or
/// below) is treated as unset, so a configured minimum of `0` does not
/// act as a floor.
pub fn apply_bounds(price: f64, min: f64, max: f64) -> f64 {
    if min > 0.0 && price < min {
        return min;
    }
    if max > 0.0 && price > max {
        return max;
    }
    price
}

/// Rounds half up to two decimal places: `floor(x * 100 + 0.5) / 100`.
///
/// This is not symmetric: `-1.005` rounds towards positive infinity
/// at the midpoint just like `1.005` does.
pub fn round_to_two_decimals(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}

/// Reads `min_price` and `max_price` from a rule configuration.
/// Missing values come back as `0.0`, i.e. "no bound".
pub fn config_bounds(config: &Fields) -> (f64, f64) {
    (
        get_f64(config, "min_price").unwrap_or(0.0),
        get_f64(config, "max_price").unwrap_or(0.0),
    )
}
