//! Asset and address validation helpers
//!
//! Assets are opaque chain identifiers; the distinguished value `"base"`
//! denotes the chain's native, fee-paying unit. Addresses use the chain's
//! canonical 32-character encoding.

/// The chain's native unit. Settlement fees are paid in this asset.
pub const BASE_ASSET: &str = "base";

/// Fee reserve in base atoms for a single settlement transaction.
pub const SETTLEMENT_FEE: i64 = 1000;

/// Number of settlement transactions the validator reserves fees for.
pub const SETTLEMENT_FEE_RESERVE_COUNT: i64 = 10;

const ADDRESS_LEN: usize = 32;
const ASSET_LEN: usize = 44;

/// Whether `asset` is the chain's native unit.
pub fn is_base(asset: &str) -> bool {
    asset == BASE_ASSET
}

/// Whether `addr` is a canonically encoded chain address.
pub fn is_valid_address(addr: &str) -> bool {
    addr.len() == ADDRESS_LEN && addr.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Whether `asset` is a well-formed asset identifier (unit hash or `"base"`).
pub fn is_valid_asset(asset: &str) -> bool {
    is_base(asset) || asset.len() == ASSET_LEN
}
