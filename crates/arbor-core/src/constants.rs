//! Protocol constants. All monetary values in base units (1 ARB = 10^8 units).

pub const COIN: u64 = 100_000_000;

/// Maximum height deficit, relative to the best node, at which a competing
/// block may still be admitted.
///
/// A block whose proposed height is `<= best_height - CUT_OFF_AGE` is rejected.
/// The block tree retains at most `CUT_OFF_AGE + 1` nodes.
///
/// # Examples
///
/// ```
/// use arbor_core::constants::{CUT_OFF_AGE, max_retained_nodes};
/// assert_eq!(CUT_OFF_AGE, 10);
/// assert_eq!(max_retained_nodes(CUT_OFF_AGE), 11);
/// ```
pub const CUT_OFF_AGE: u64 = 10;

/// Height assigned to the genesis node.
pub const GENESIS_HEIGHT: u64 = 1;

/// Default value minted by each block's coinbase transaction.
pub const DEFAULT_COINBASE_REWARD: u64 = 25 * COIN;

/// Current transaction and block header version.
pub const PROTOCOL_VERSION: u64 = 1;

/// Number of chain nodes retained for a given cut-off age.
pub const fn max_retained_nodes(cut_off_age: u64) -> usize {
    cut_off_age as usize + 1
}
