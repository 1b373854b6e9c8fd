//! Longest-valid-chain consensus
//!
//! Every known peer is asked for its chain. The longest chain that is
//! strictly longer than the local one and passes full validation wins; among
//! equally long winners the first peer in iteration order is kept. There is
//! no fork-choice weighting and no finality: a peer able to out-mine the rest
//! of the network can always replace everyone's chain.

use futures::future::join_all;
use tracing::{info, warn};

use crate::blockchain::{validate_chain, Block};
use crate::miner::ProofOfWork;
use crate::network::{ChainSource, PeerFetch};

/// A peer chain selected for adoption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub peer: String,
    pub chain: Vec<Block>,
}

/// Consensus engine for picking the chain to adopt
pub struct Consensus;

impl Consensus {
    /// Fetch every peer's chain and pick the one to adopt, if any.
    ///
    /// Peers are queried concurrently; the decision is made only after all of
    /// them have answered or failed.
    pub async fn resolve<S>(
        local_length: usize,
        peers: &[String],
        source: &S,
        pow: &ProofOfWork,
    ) -> Option<Candidate>
    where
        S: ChainSource + ?Sized,
    {
        let fetches = join_all(peers.iter().map(|peer| source.fetch_chain(peer))).await;
        let results = peers.iter().cloned().zip(fetches).collect();
        Self::select_longest(local_length, results, pow)
    }

    /// Pick the longest valid chain exceeding `local_length` from already
    /// collected peer results, in the order given.
    pub fn select_longest(
        local_length: usize,
        results: Vec<(String, PeerFetch)>,
        pow: &ProofOfWork,
    ) -> Option<Candidate> {
        let mut max_length = local_length;
        let mut best: Option<Candidate> = None;

        for (peer, fetch) in results {
            let response = match fetch {
                PeerFetch::Chain(response) => response,
                PeerFetch::Unreachable(reason) => {
                    warn!(%peer, %reason, "peer unreachable, skipping");
                    continue;
                }
                PeerFetch::Status(status) => {
                    warn!(%peer, status, "peer returned non-success status, skipping");
                    continue;
                }
                PeerFetch::Malformed(reason) => {
                    warn!(%peer, %reason, "peer returned malformed chain, skipping");
                    continue;
                }
            };

            if response.length != response.chain.len() {
                warn!(
                    %peer,
                    reported = response.length,
                    actual = response.chain.len(),
                    "peer chain length mismatch, skipping"
                );
                continue;
            }

            if response.length <= max_length {
                continue;
            }

            if let Err(e) = validate_chain(&response.chain, pow) {
                warn!(%peer, length = response.length, error = %e, "peer chain invalid, skipping");
                continue;
            }

            max_length = response.length;
            best = Some(Candidate {
                peer,
                chain: response.chain,
            });
        }

        if let Some(candidate) = &best {
            info!(
                peer = %candidate.peer,
                length = candidate.chain.len(),
                local_length,
                "longer valid chain found"
            );
        }
        best
    }
}
