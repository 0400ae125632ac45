use alloy::primitives::U256;

/// Converts a fixed-point integer to `f64` by dividing out `precision`
/// decimal places. Saturates to `f64::MAX` when the value does not fit.
pub fn divide_by_precision_f64(value: U256, precision: u8) -> f64 {
    let scale = U256::from(10).pow(U256::from(precision));

    let quotient = match value.checked_div(scale) {
        Some(q) => q,
        None => return f64::MAX,
    };

    let remainder = match value.checked_rem(scale) {
        Some(r) => r,
        None => return f64::MAX,
    };

    let quotient_u128 = match u128::try_from(quotient) {
        Ok(q) => q,
        Err(_) => return f64::MAX,
    };

    let remainder_u128 = match u128::try_from(remainder) {
        Ok(r) => r,
        Err(_) => return f64::MAX,
    };

    let scale_u128 = match u128::try_from(scale) {
        Ok(s) => s,
        Err(_) => return f64::MAX,
    };

    quotient_u128 as f64 + (remainder_u128 as f64) / (scale_u128 as f64)
}
