// core.rs splits ledger responsibilities into submodules: the chain itself,
// canonical hashing, and whole-chain validation.
pub mod chain;
pub mod hasher;
pub mod validation;

pub use chain::*;
pub use hasher::{canonical_hash, canonical_json, sha256_hex};
pub use validation::*;
