use crate::blockchain::core::chain::Block;
use crate::error::ChainError;
use crate::miner::ProofOfWork;

/// Walk `chain` from the second block on, checking that each block links to
/// the hash of its predecessor and carries a valid proof against the
/// predecessor's proof. Stops at the first failing block.
pub fn validate_chain(chain: &[Block], pow: &ProofOfWork) -> Result<(), ChainError> {
    let (first, rest) = chain
        .split_first()
        .ok_or_else(|| ChainError::InvalidChain("Chain is empty".to_string()))?;

    let mut previous = first;
    for block in rest {
        if block.previous_hash != previous.hash()? {
            return Err(ChainError::InvalidBlockLinkage { index: block.index });
        }
        if !pow.is_valid_proof(block.proof, previous.proof) {
            return Err(ChainError::InvalidProofOfWork { index: block.index });
        }
        previous = block;
    }
    Ok(())
}

pub fn is_chain_valid(chain: &[Block], pow: &ProofOfWork) -> bool {
    validate_chain(chain, pow).is_ok()
}
