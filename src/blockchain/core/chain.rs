use serde::{Deserialize, Serialize};
use serde_json::Number;
use tracing::info;

use crate::blockchain::core::hasher::canonical_hash;
use crate::blockchain::core::validation::validate_chain;
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::miner::ProofOfWork;
use crate::transaction::Transaction;

pub const GENESIS_PROOF: i64 = 1;
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Local creation instant with microsecond precision.
pub fn current_timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S%.6f")
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: String,
    pub proof: i64,
    pub previous_hash: String,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Hex SHA-256 over the block's canonical JSON form.
    pub fn hash(&self) -> Result<String, ChainError> {
        canonical_hash(self)
    }
}

/// Wire shape of a full chain, as served to clients and fetched from peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
}

impl From<Vec<Block>> for ChainResponse {
    fn from(chain: Vec<Block>) -> Self {
        let length = chain.len();
        Self { chain, length }
    }
}

/// The local ledger: the chain of blocks plus the pool of pending
/// transactions. The chain always holds at least the genesis block.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    mempool: Mempool,
    pow: ProofOfWork,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new(ProofOfWork::default())
    }
}

impl Blockchain {
    /// Create a ledger holding only the genesis block.
    pub fn new(pow: ProofOfWork) -> Self {
        let mut blockchain = Blockchain {
            blocks: Vec::new(),
            mempool: Mempool::new(),
            pow,
        };
        blockchain.create_block(GENESIS_PROOF, GENESIS_PREVIOUS_HASH);
        blockchain
    }

    /// Append a block carrying every pending transaction.
    ///
    /// The pool is drained in the same call, so a transaction is either in
    /// this block or still pending, never both and never lost.
    pub fn create_block(&mut self, proof: i64, previous_hash: impl Into<String>) -> Block {
        let block = Block {
            index: self.blocks.len() as u64 + 1,
            timestamp: current_timestamp(),
            proof,
            previous_hash: previous_hash.into(),
            transactions: self.mempool.drain(),
        };
        self.blocks.push(block.clone());
        block
    }

    pub fn get_previous_block(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    /// Queue a transaction and return the index of the block expected to
    /// include it.
    pub fn add_transaction(
        &mut self,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: impl Into<Number>,
    ) -> u64 {
        self.submit(Transaction::new(sender, receiver, amount))
    }

    pub fn submit(&mut self, tx: Transaction) -> u64 {
        self.mempool.add_transaction(tx);
        self.get_previous_block().index + 1
    }

    /// Run the full mining sequence against the current tip.
    ///
    /// The search holds `&mut self` throughout; `Node::mine` performs the
    /// same steps with the search outside the ledger lock.
    pub fn mine_block(
        &mut self,
        miner: &str,
        reward_receiver: &str,
        reward: Number,
    ) -> Result<Block, ChainError> {
        let previous = self.get_previous_block();
        let proof = self.pow.solve(previous.proof)?;
        let previous_hash = previous.hash()?;
        self.add_transaction(miner, reward_receiver, reward);
        let block = self.create_block(proof, previous_hash);
        info!(index = block.index, proof = block.proof, "block mined");
        Ok(block)
    }

    /// Swap in a whole new chain. Pending transactions are kept.
    pub fn replace_chain(&mut self, chain: Vec<Block>) -> Result<(), ChainError> {
        if chain.is_empty() {
            return Err(ChainError::InvalidChain(
                "Cannot replace the chain with an empty one".to_string(),
            ));
        }
        info!(
            old_length = self.blocks.len(),
            new_length = chain.len(),
            "chain replaced"
        );
        self.blocks = chain;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        validate_chain(&self.blocks, &self.pow).is_ok()
    }

    pub fn chain(&self) -> &[Block] {
        &self.blocks
    }

    pub fn to_response(&self) -> ChainResponse {
        ChainResponse::from(self.blocks.clone())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn pending(&self) -> &[Transaction] {
        self.mempool.get_all_transactions()
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }
}
