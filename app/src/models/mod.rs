// topup_app/src/models/mod.rs

//! Database row shapes and their conversion into core types.

pub mod order;

pub use order::OrderRecord;
