use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::blockchain::{Block, Blockchain, ChainResponse};
use crate::config::Config;
use crate::consensus::Consensus;
use crate::error::ChainError;
use crate::network::{ChainSource, HttpChainSource, PeerSet};
use crate::transaction::TransactionRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeState {
    Booting,
    Syncing,
    Ready,
}

/// Result of a consensus round as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolveOutcome {
    pub replaced: bool,
    pub chain: Vec<Block>,
}

/// Marks one consensus round in flight for as long as it lives, so the
/// count stays right even if the round's future is dropped early.
struct SyncRound<'a>(&'a AtomicUsize);

impl<'a> SyncRound<'a> {
    fn enter(rounds: &'a AtomicUsize) -> Self {
        rounds.fetch_add(1, Ordering::SeqCst);
        SyncRound(rounds)
    }
}

impl Drop for SyncRound<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Install the global tracing subscriber. Honours `RUST_LOG`, defaulting to
/// `info`. Calling it more than once is harmless.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// One ledger node: the chain behind a single lock, the known peers, and
/// the operations callers may invoke on them.
pub struct Node {
    pub config: Config,
    node_address: String,
    blockchain: Arc<RwLock<Blockchain>>,
    peers: Arc<RwLock<PeerSet>>,
    source: Arc<dyn ChainSource>,
    state: Arc<RwLock<NodeState>>,
    // Consensus rounds in flight; the node reports Syncing while non-zero.
    syncing: AtomicUsize,
    // Serializes mining so concurrent requests do not race for the same tip.
    mining: Mutex<()>,
    blocks_mined: AtomicU64,
}

impl Node {
    /// Build a node that fetches peer chains over HTTP.
    pub fn from_config(config: Config) -> Result<Self, ChainError> {
        let source = HttpChainSource::new(config.network.request_timeout())?;
        Self::new(config, Arc::new(source))
    }

    pub fn new(config: Config, source: Arc<dyn ChainSource>) -> Result<Self, ChainError> {
        config.validate()?;

        let mut peers = PeerSet::new();
        if !config.network.bootstrap_peers.is_empty() {
            peers.register_all(&config.network.bootstrap_peers)?;
        }

        let blockchain = Blockchain::new(config.miner.proof_of_work());
        let node_address = Uuid::new_v4().simple().to_string();
        info!(
            %node_address,
            difficulty = config.miner.difficulty,
            peers = peers.len(),
            "node initialised"
        );

        Ok(Self {
            config,
            node_address,
            blockchain: Arc::new(RwLock::new(blockchain)),
            peers: Arc::new(RwLock::new(peers)),
            source,
            state: Arc::new(RwLock::new(NodeState::Booting)),
            syncing: AtomicUsize::new(0),
            mining: Mutex::new(()),
            blocks_mined: AtomicU64::new(0),
        })
    }

    pub fn node_address(&self) -> &str {
        &self.node_address
    }

    pub fn blocks_mined(&self) -> u64 {
        self.blocks_mined.load(Ordering::Relaxed)
    }

    /// `Syncing` while any consensus round runs, otherwise the lifecycle
    /// state last set with [`Node::set_state`].
    pub async fn state(&self) -> NodeState {
        if self.syncing.load(Ordering::SeqCst) > 0 {
            return NodeState::Syncing;
        }
        *self.state.read().await
    }

    pub async fn set_state(&self, state: NodeState) {
        *self.state.write().await = state;
    }

    /// Shared handle to the ledger.
    pub fn blockchain(&self) -> Arc<RwLock<Blockchain>> {
        self.blockchain.clone()
    }

    /// Mine one block paying the configured reward.
    ///
    /// The proof search runs on the blocking pool without holding the ledger
    /// lock. The reward transaction, pool drain and append then happen under
    /// one write lock, and only if the tip is still the one the proof was
    /// computed against; otherwise the search restarts from the new tip.
    pub async fn mine(&self) -> Result<Block, ChainError> {
        let _mining = self.mining.lock().await;

        loop {
            let (pow, previous_index, previous_proof, previous_hash) = {
                let chain = self.blockchain.read().await;
                let previous = chain.get_previous_block();
                (*chain.pow(), previous.index, previous.proof, previous.hash()?)
            };

            let solution = tokio::task::spawn_blocking(move || pow.search(previous_proof))
                .await
                .map_err(|e| ChainError::Internal(format!("Proof search task failed: {}", e)))??;

            let mut chain = self.blockchain.write().await;
            let tip = chain.get_previous_block();
            if tip.index != previous_index || tip.hash()? != previous_hash {
                warn!(
                    expected_index = previous_index,
                    tip_index = tip.index,
                    "tip moved during proof search, retrying"
                );
                continue;
            }

            chain.add_transaction(
                self.node_address.as_str(),
                self.config.miner.reward_receiver.as_str(),
                self.config.miner.reward_amount,
            );
            let block = chain.create_block(solution.proof, previous_hash);
            self.blocks_mined.fetch_add(1, Ordering::SeqCst);
            info!(
                index = block.index,
                proof = block.proof,
                attempts = solution.attempts,
                transactions = block.transactions.len(),
                "block mined"
            );
            return Ok(block);
        }
    }

    pub async fn chain(&self) -> ChainResponse {
        self.blockchain.read().await.to_response()
    }

    pub async fn chain_len(&self) -> usize {
        self.blockchain.read().await.len()
    }

    pub async fn is_valid(&self) -> bool {
        self.blockchain.read().await.is_valid()
    }

    /// Queue a client transaction; returns the index of the block expected
    /// to include it. Incomplete requests are rejected without touching the
    /// pool.
    pub async fn submit_transaction(&self, request: TransactionRequest) -> Result<u64, ChainError> {
        let tx = request.validate()?;
        let index = self.blockchain.write().await.submit(tx);
        Ok(index)
    }

    /// Register a batch of peers and return the full peer list.
    pub async fn register_peers(&self, addresses: &[String]) -> Result<Vec<String>, ChainError> {
        let mut peers = self.peers.write().await;
        let added = peers.register_all(addresses)?;
        info!(added, total = peers.len(), "peers registered");
        Ok(peers.list())
    }

    pub async fn peers(&self) -> Vec<String> {
        self.peers.read().await.list()
    }

    /// Run one consensus round and adopt the winning chain, if any.
    pub async fn resolve_conflicts(&self) -> Result<ResolveOutcome, ChainError> {
        let peers = self.peers.read().await.list();
        let (local_length, pow) = {
            let chain = self.blockchain.read().await;
            (chain.len(), *chain.pow())
        };

        let _round = SyncRound::enter(&self.syncing);
        let candidate = Consensus::resolve(local_length, &peers, self.source.as_ref(), &pow).await;

        let mut chain = self.blockchain.write().await;
        let replaced = match candidate {
            Some(candidate) if candidate.chain.len() > chain.len() => {
                info!(peer = %candidate.peer, "adopting peer chain");
                chain.replace_chain(candidate.chain).map(|_| true)
            }
            Some(candidate) => {
                info!(
                    peer = %candidate.peer,
                    local_length = chain.len(),
                    "local chain grew during resolution, keeping it"
                );
                Ok(false)
            }
            None => Ok(false),
        };
        replaced.map(|replaced| ResolveOutcome {
            replaced,
            chain: chain.chain().to_vec(),
        })
    }

    /// Mark the node ready and serve the HTTP API until it stops.
    #[cfg(feature = "api")]
    pub async fn start(self: Arc<Self>) -> Result<(), Box<dyn std::error::Error>> {
        let addr = format!("{}:{}", self.config.network.host, self.config.network.api_port);
        self.set_state(NodeState::Ready).await;
        info!(%addr, node_address = %self.node_address, "starting node");
        crate::api::run_api_server(self, &addr).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::is_chain_valid;
    use crate::miner::ProofOfWork;
    use crate::network::{PeerFetch, StaticChainSource};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::{watch, Semaphore};

    /// Answers every fetch with `fetch`, but only once the gate is opened.
    /// Each fetch adds a permit to `entered` when it starts waiting.
    struct GatedSource {
        fetch: PeerFetch,
        entered: Arc<Semaphore>,
        gate: watch::Receiver<bool>,
    }

    impl GatedSource {
        fn new(fetch: PeerFetch) -> (Self, Arc<Semaphore>, watch::Sender<bool>) {
            let entered = Arc::new(Semaphore::new(0));
            let (open, gate) = watch::channel(false);
            let source = GatedSource {
                fetch,
                entered: entered.clone(),
                gate,
            };
            (source, entered, open)
        }
    }

    #[async_trait]
    impl ChainSource for GatedSource {
        async fn fetch_chain(&self, _peer: &str) -> PeerFetch {
            self.entered.add_permits(1);
            let mut gate = self.gate.clone();
            let _ = gate.wait_for(|open| *open).await;
            self.fetch.clone()
        }
    }

    fn gated_node(fetch: PeerFetch) -> (Arc<Node>, Arc<Semaphore>, watch::Sender<bool>) {
        let (source, entered, open) = GatedSource::new(fetch);
        let mut config = test_config();
        config.network.bootstrap_peers = vec!["127.0.0.1:5001".to_string()];
        let node = Arc::new(Node::new(config, Arc::new(source)).unwrap());
        (node, entered, open)
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.miner.difficulty = 2;
        config
    }

    fn test_node(source: StaticChainSource) -> Node {
        Node::new(test_config(), Arc::new(source)).unwrap()
    }

    fn chain_of(length: usize) -> Vec<Block> {
        let mut chain = Blockchain::new(ProofOfWork::new(2));
        while chain.len() < length {
            chain.mine_block("peer", "peer-miner", 1.into()).unwrap();
        }
        chain.chain().to_vec()
    }

    #[tokio::test]
    async fn test_mine_appends_rewarded_block() {
        tokio::time::timeout(Duration::from_secs(30), async {
            let node = test_node(StaticChainSource::new());
            node.submit_transaction(TransactionRequest {
                sender: Some("alice".into()),
                receiver: Some("bob".into()),
                amount: Some(3.into()),
            })
            .await
            .unwrap();

            let block = node.mine().await.unwrap();
            assert_eq!(block.index, 2);
            assert_eq!(block.transactions.len(), 2);
            assert_eq!(block.transactions[1].sender, node.node_address());
            assert_eq!(block.transactions[1].receiver, "miner");
            assert_eq!(node.blocks_mined(), 1);
            assert!(node.is_valid().await);
            assert_eq!(node.chain().await.length, 2);
        })
        .await
        .expect("test_mine_appends_rewarded_block timed out");
    }

    #[tokio::test]
    async fn test_concurrent_mines_extend_one_chain() {
        tokio::time::timeout(Duration::from_secs(30), async {
            let node = Arc::new(test_node(StaticChainSource::new()));
            let a = tokio::spawn({
                let node = node.clone();
                async move { node.mine().await }
            });
            let b = tokio::spawn({
                let node = node.clone();
                async move { node.mine().await }
            });
            a.await.unwrap().unwrap();
            b.await.unwrap().unwrap();

            let response = node.chain().await;
            assert_eq!(response.length, 3);
            assert!(is_chain_valid(&response.chain, &ProofOfWork::new(2)));
        })
        .await
        .expect("test_concurrent_mines_extend_one_chain timed out");
    }

    #[tokio::test]
    async fn test_incomplete_transaction_never_mined() {
        tokio::time::timeout(Duration::from_secs(30), async {
            let node = test_node(StaticChainSource::new());
            let result = node
                .submit_transaction(TransactionRequest {
                    sender: Some("alice".into()),
                    receiver: Some("bob".into()),
                    amount: None,
                })
                .await;
            assert!(matches!(result, Err(ChainError::InvalidTransaction(_))));

            let block = node.mine().await.unwrap();
            assert_eq!(block.transactions.len(), 1);
            assert!(block.transactions.iter().all(|tx| tx.sender != "alice"));
        })
        .await
        .expect("test_incomplete_transaction_never_mined timed out");
    }

    #[tokio::test]
    async fn test_register_peers() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let node = test_node(StaticChainSource::new());
            let peers = node
                .register_peers(&["http://127.0.0.1:5001".to_string(), "127.0.0.1:5002".to_string()])
                .await
                .unwrap();
            assert_eq!(peers, vec!["127.0.0.1:5001", "127.0.0.1:5002"]);

            assert!(node.register_peers(&[]).await.is_err());
            assert_eq!(node.peers().await.len(), 2);
        })
        .await
        .expect("test_register_peers timed out");
    }

    #[tokio::test]
    async fn test_resolve_adopts_longer_chain() {
        tokio::time::timeout(Duration::from_secs(30), async {
            let five = chain_of(5);
            let source = StaticChainSource::new()
                .with("127.0.0.1:5001", PeerFetch::Chain(ChainResponse::from(five.clone())))
                .with("127.0.0.1:5002", PeerFetch::Chain(ChainResponse::from(chain_of(4))));
            let node = test_node(source);
            node.mine().await.unwrap();
            node.mine().await.unwrap();
            node.register_peers(&["127.0.0.1:5001".to_string(), "127.0.0.1:5002".to_string()])
                .await
                .unwrap();

            let outcome = node.resolve_conflicts().await.unwrap();
            assert!(outcome.replaced);
            assert_eq!(outcome.chain, five);
            assert_eq!(node.chain().await.chain, five);
        })
        .await
        .expect("test_resolve_adopts_longer_chain timed out");
    }

    #[tokio::test]
    async fn test_resolve_keeps_local_chain() {
        tokio::time::timeout(Duration::from_secs(30), async {
            let mut forged = chain_of(6);
            forged[3].proof += 1;
            let source = StaticChainSource::new()
                .with("127.0.0.1:5001", PeerFetch::Chain(ChainResponse::from(chain_of(3))))
                .with("127.0.0.1:5002", PeerFetch::Chain(ChainResponse::from(forged)))
                .with("127.0.0.1:5003", PeerFetch::Status(500));
            let node = test_node(source);
            node.mine().await.unwrap();
            node.mine().await.unwrap();
            let before = node.chain().await.chain;
            node.register_peers(&[
                "127.0.0.1:5001".to_string(),
                "127.0.0.1:5002".to_string(),
                "127.0.0.1:5003".to_string(),
                "127.0.0.1:5004".to_string(),
            ])
            .await
            .unwrap();

            let outcome = node.resolve_conflicts().await.unwrap();
            assert!(!outcome.replaced);
            assert_eq!(outcome.chain, before);
            assert_eq!(node.state().await, NodeState::Booting);
        })
        .await
        .expect("test_resolve_keeps_local_chain timed out");
    }

    #[test]
    fn test_bad_bootstrap_peer_rejected() {
        let mut config = test_config();
        config.network.bootstrap_peers = vec!["ftp://nope:1".to_string()];
        assert!(Node::new(config, Arc::new(StaticChainSource::new())).is_err());
    }

    #[tokio::test]
    async fn test_mine_retries_when_tip_moves_during_search() {
        tokio::time::timeout(Duration::from_secs(30), async {
            let node = Arc::new(test_node(StaticChainSource::new()));
            let replacement = chain_of(4);

            let mining = tokio::spawn({
                let node = node.clone();
                async move { node.mine().await }
            });
            // The guard is taken in the same poll that snapshots the tip.
            while node.mining.try_lock().is_ok() {
                tokio::task::yield_now().await;
            }
            node.blockchain()
                .write()
                .await
                .replace_chain(replacement.clone())
                .unwrap();

            let block = mining.await.unwrap().unwrap();
            assert_eq!(block.index, 5);
            assert_eq!(block.previous_hash, replacement[3].hash().unwrap());
            assert!(ProofOfWork::new(2).is_valid_proof(block.proof, replacement[3].proof));
            assert_eq!(node.chain_len().await, 5);
            assert!(node.is_valid().await);
        })
        .await
        .expect("test_mine_retries_when_tip_moves_during_search timed out");
    }

    #[tokio::test]
    async fn test_resolve_keeps_chain_that_grew_during_round() {
        tokio::time::timeout(Duration::from_secs(30), async {
            let (node, entered, open) =
                gated_node(PeerFetch::Chain(ChainResponse::from(chain_of(3))));

            let round = tokio::spawn({
                let node = node.clone();
                async move { node.resolve_conflicts().await }
            });
            entered.acquire().await.unwrap().forget();

            // Local chain overtakes the peer's while it is still answering.
            let grown = chain_of(4);
            node.blockchain().write().await.replace_chain(grown.clone()).unwrap();
            open.send(true).unwrap();

            let outcome = round.await.unwrap().unwrap();
            assert!(!outcome.replaced);
            assert_eq!(outcome.chain, grown);
            assert_eq!(node.chain().await.chain, grown);
        })
        .await
        .expect("test_resolve_keeps_chain_that_grew_during_round timed out");
    }

    #[tokio::test]
    async fn test_overlapping_resolves_restore_ready() {
        tokio::time::timeout(Duration::from_secs(30), async {
            let (node, entered, open) = gated_node(PeerFetch::Status(500));
            node.set_state(NodeState::Ready).await;

            let first = tokio::spawn({
                let node = node.clone();
                async move { node.resolve_conflicts().await }
            });
            let second = tokio::spawn({
                let node = node.clone();
                async move { node.resolve_conflicts().await }
            });
            entered.acquire_many(2).await.unwrap().forget();
            assert_eq!(node.state().await, NodeState::Syncing);

            open.send(true).unwrap();
            first.await.unwrap().unwrap();
            second.await.unwrap().unwrap();
            assert_eq!(node.state().await, NodeState::Ready);
        })
        .await
        .expect("test_overlapping_resolves_restore_ready timed out");
    }

    #[tokio::test]
    async fn test_resolve_started_while_booting_ends_ready() {
        tokio::time::timeout(Duration::from_secs(30), async {
            let (node, entered, open) = gated_node(PeerFetch::Status(500));

            let round = tokio::spawn({
                let node = node.clone();
                async move { node.resolve_conflicts().await }
            });
            entered.acquire().await.unwrap().forget();
            assert_eq!(node.state().await, NodeState::Syncing);

            node.set_state(NodeState::Ready).await;
            assert_eq!(node.state().await, NodeState::Syncing);

            open.send(true).unwrap();
            round.await.unwrap().unwrap();
            assert_eq!(node.state().await, NodeState::Ready);
        })
        .await
        .expect("test_resolve_started_while_booting_ends_ready timed out");
    }
}
