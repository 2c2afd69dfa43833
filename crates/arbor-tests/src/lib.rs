//! Integration and adversarial test suites for Arbor.
//!
//! The tests under `tests/` drive the block tree from the outside, through
//! the public API only: fork choice and retention, and invariants under
//! randomized block and transaction streams.

pub mod helpers;
