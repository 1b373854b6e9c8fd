// Thin re-export module: implementation is in `blockchain/core.rs` so chain
// management, hashing and validation can live in separate files.

pub mod core;
pub use core::*;
