//! Test helpers
//!
//! Throwaway ledgers, wallets, and forked chains for unit tests.

pub mod test_utils;

pub use test_utils::*;
