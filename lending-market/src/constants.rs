/********** Numbers **********/

/// Fixed-point scalar for WAD (18 decimal) numbers
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Fixed-point scalar for basis points
pub const SCALAR_BPS: i128 = 10_000;

// seconds per year
pub const SECONDS_PER_YEAR: u64 = 31536000;

/********** Market Policy **********/

/// Maximum age of a cached reserve price, in seconds
pub const PRICE_STALENESS_THRESHOLD_S: u64 = 60;

/// Maximum share of an obligation's unweighted debt value that can be repaid in one liquidation
pub const CLOSE_FACTOR_PCT: u32 = 20;

/// Maximum number of reserves a market can list
pub const MAX_RESERVES: u32 = 32;

/// Maximum number of deposit and borrow entries an obligation can hold
pub const MAX_OBLIGATION_POSITIONS: u32 = 10;
