use soroban_sdk::contracterror;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
/// Error codes for the lending market contract. Common errors are codes that match up with the built-in
/// contracts error reporting. Lending market specific errors start at 1400.
pub enum LendingError {
    // Common Errors
    InternalError = 1,
    ProofAlreadyConsumed = 3,
    InvalidCapability = 4,
    NotInitialized = 5,

    InvalidAmount = 8,
    ArithmeticOverflow = 12,
    ArithmeticUnderflow = 13,
    DivisionByZero = 14,

    // Market Request Errors (start at 1400)
    InvalidReserveConfig = 1400,
    ReserveAlreadyExists = 1401,
    ReserveNotFound = 1402,
    ObligationNotFound = 1403,
    MaxReservesExceeded = 1404,
    MaxPositionsExceeded = 1405,

    // Oracle Errors
    StalePrice = 1410,

    // Reserve Errors
    InsufficientLiquidity = 1420,
    DepositLimitExceeded = 1421,
    BorrowLimitExceeded = 1422,
    InsufficientCTokens = 1423,
    TreasuryOutOfSync = 1424,

    // Obligation Errors
    InsufficientDeposit = 1430,
    ExceedsAllowedBorrow = 1431,
    BelowRequiredCollateral = 1432,
    NotLiquidatable = 1433,
    BorrowNotFound = 1434,
    TicketNotFresh = 1435,
}
