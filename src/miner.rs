//! Proof-of-work puzzle
//!
//! A proof `n` is valid against the previous block's proof `p` when the hex
//! SHA-256 of the decimal string of `n² − p²` starts with `difficulty` zeros.
//! The difference is signed, so `"-8"` and `"8"` are different puzzles.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blockchain::core::hasher::sha256_hex;
use crate::error::ChainError;

/// Number of leading `'0'` hex characters required by default.
pub const DEFAULT_DIFFICULTY: usize = 4;

/// Longest possible prefix of a hex-encoded SHA-256 digest.
pub const MAX_DIFFICULTY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfWork {
    pub difficulty: usize,
    /// Upper bound on candidates tried by [`ProofOfWork::search`]. `None`
    /// searches until a proof is found.
    pub max_attempts: Option<u64>,
}

/// A found proof together with the number of candidates it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Solution {
    pub proof: i64,
    pub attempts: u64,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY)
    }
}

impl ProofOfWork {
    pub fn new(difficulty: usize) -> Self {
        Self {
            difficulty,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Digest the puzzle is judged on.
    pub fn proof_digest(proof: i64, previous_proof: i64) -> String {
        let proof = i128::from(proof);
        let previous_proof = i128::from(previous_proof);
        let difference = proof * proof - previous_proof * previous_proof;
        sha256_hex(difference.to_string().as_bytes())
    }

    pub fn is_valid_proof(&self, proof: i64, previous_proof: i64) -> bool {
        let digest = Self::proof_digest(proof, previous_proof);
        digest.len() >= self.difficulty && digest.bytes().take(self.difficulty).all(|b| b == b'0')
    }

    /// Linear search from 1 upward; the first hit is the smallest valid proof.
    pub fn search(&self, previous_proof: i64) -> Result<Solution, ChainError> {
        let mut candidate: i64 = 1;
        let mut attempts: u64 = 0;

        loop {
            if let Some(max) = self.max_attempts {
                if attempts >= max {
                    return Err(ChainError::ProofSearchExhausted { attempts });
                }
            }

            attempts += 1;
            if self.is_valid_proof(candidate, previous_proof) {
                debug!(
                    proof = candidate,
                    previous_proof,
                    attempts,
                    difficulty = self.difficulty,
                    "proof found"
                );
                return Ok(Solution {
                    proof: candidate,
                    attempts,
                });
            }

            candidate = candidate
                .checked_add(1)
                .ok_or(ChainError::ProofSearchExhausted { attempts })?;
        }
    }

    pub fn solve(&self, previous_proof: i64) -> Result<i64, ChainError> {
        self.search(previous_proof).map(|solution| solution.proof)
    }
}
