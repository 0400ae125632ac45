/// Decimal places of the 1e18 fixed-point health factor.
pub const HEALTH_FACTOR_DECIMALS: u8 = 18;

/// Decimal places of pool base-currency (USD) amounts.
pub const USD_VALUE_DECIMALS: u8 = 8;

/// Health factor below which a position is liquidatable.
pub const LIQUIDATION_THRESHOLD: f64 = 1.0;

/// Minimum outstanding debt, in USD, for an at-risk position to alert.
pub const ALERT_MIN_DEBT_USD: f64 = 5.0;

/// Holders worth less than this many USD are dropped from snapshots.
pub const DUST_THRESHOLD_USD: f64 = 0.01;

/// Block-range width of one transfer-log request.
pub const LOG_CHUNK_SIZE: u64 = 50_000;

/// Upper bound on concurrent balance reads during reconciliation.
pub const BALANCE_FETCH_CONCURRENCY: usize = 25;
