/// Annual rate used to discount future nominal amounts into today's money.
pub const REAL_VALUE_DISCOUNT_RATE: f64 = 0.03;

/// Converts a nominal amount paid in `year` into `reference_year` purchasing power.
pub fn real_value(nominal_value: f64, year: i32, reference_year: i32) -> f64 {
    nominal_value * (1.0 - REAL_VALUE_DISCOUNT_RATE).powi(year - reference_year)
}

/// Grows a today's-money amount to its nominal value in `to_year` at `rate_percent` a year.
pub fn projected_nominal_value(value: f64, rate_percent: f64, from_year: i32, to_year: i32) -> f64 {
    value * (1.0 + rate_percent / 100.0).powi(to_year - from_year)
}
