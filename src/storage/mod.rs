//! Data storage and persistence
//!
//! The pending transaction pool and the sled store that keeps the chain and
//! pool across restarts.

pub mod chain_store;
pub mod memory_pool;

pub use chain_store::ChainStore;
pub use memory_pool::MemoryPool;
