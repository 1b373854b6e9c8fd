//! Peer bookkeeping and chain fetching
//!
//! Peers are known only through explicit registration. Each address is
//! normalised to `host:port` so `http://127.0.0.1:5001/` and `127.0.0.1:5001`
//! name the same peer. Chains are pulled from `http://{peer}/get_chain`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::blockchain::ChainResponse;
use crate::error::ChainError;

/// Normalise a peer address to `host:port`.
///
/// Accepts `http://` URLs (`http://host:port/path`) and bare `host:port`
/// pairs. A URL without an explicit port gets port 80. Chains are always
/// fetched over plain HTTP, so any other scheme is rejected.
pub fn normalize_peer(address: &str) -> Result<String, ChainError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ChainError::InvalidPeer("Peer address is empty".to_string()));
    }

    let url = if address.contains("://") {
        Url::parse(address)
    } else {
        Url::parse(&format!("http://{}", address))
    }
    .map_err(|e| ChainError::InvalidPeer(format!("{}: {}", address, e)))?;

    if url.scheme() != "http" {
        return Err(ChainError::InvalidPeer(format!(
            "{}: unsupported scheme {}",
            address,
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ChainError::InvalidPeer(format!("{}: missing host", address)))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| ChainError::InvalidPeer(format!("{}: missing port", address)))?;

    Ok(format!("{}:{}", host, port))
}

/// Deduplicated set of peer addresses, iterated in sorted order.
#[derive(Debug, Clone, Default)]
pub struct PeerSet {
    peers: BTreeSet<String>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one address; returns false when it was already known.
    pub fn register(&mut self, address: &str) -> Result<bool, ChainError> {
        let peer = normalize_peer(address)?;
        Ok(self.peers.insert(peer))
    }

    /// Register a batch of addresses.
    ///
    /// Every address is parsed before any is inserted, so a malformed entry
    /// leaves the set untouched.
    pub fn register_all<S: AsRef<str>>(&mut self, addresses: &[S]) -> Result<usize, ChainError> {
        if addresses.is_empty() {
            return Err(ChainError::InvalidPeer("No node".to_string()));
        }
        let normalized = addresses
            .iter()
            .map(|a| normalize_peer(a.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let added = normalized
            .into_iter()
            .filter(|peer| self.peers.insert(peer.clone()))
            .count();
        Ok(added)
    }

    pub fn list(&self) -> Vec<String> {
        self.peers.iter().cloned().collect()
    }

    pub fn contains(&self, address: &str) -> bool {
        normalize_peer(address)
            .map(|peer| self.peers.contains(&peer))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Outcome of asking one peer for its chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerFetch {
    /// Connection failed or timed out.
    Unreachable(String),
    /// The peer answered with something other than 200.
    Status(u16),
    /// The peer answered 200 but the body was not a chain.
    Malformed(String),
    Chain(ChainResponse),
}

#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn fetch_chain(&self, peer: &str) -> PeerFetch;
}

/// Fetches chains over HTTP from other nodes' `/get_chain` endpoint.
#[derive(Debug, Clone)]
pub struct HttpChainSource {
    client: Client,
}

impl HttpChainSource {
    pub fn new(timeout: Duration) -> Result<Self, ChainError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChainSource for HttpChainSource {
    async fn fetch_chain(&self, peer: &str) -> PeerFetch {
        let url = format!("http://{}/get_chain", peer);
        debug!(%url, "fetching peer chain");

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => return PeerFetch::Unreachable(e.to_string()),
        };

        if response.status() != StatusCode::OK {
            return PeerFetch::Status(response.status().as_u16());
        }

        match response.json::<ChainResponse>().await {
            Ok(body) => PeerFetch::Chain(body),
            Err(e) => PeerFetch::Malformed(e.to_string()),
        }
    }
}

/// Serves canned responses from memory; peers it does not know are
/// unreachable. Lets consensus run without a network.
#[derive(Debug, Clone, Default)]
pub struct StaticChainSource {
    responses: HashMap<String, PeerFetch>,
}

impl StaticChainSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, peer: impl Into<String>, fetch: PeerFetch) -> Self {
        self.insert(peer, fetch);
        self
    }

    pub fn insert(&mut self, peer: impl Into<String>, fetch: PeerFetch) {
        self.responses.insert(peer.into(), fetch);
    }
}

#[async_trait]
impl ChainSource for StaticChainSource {
    async fn fetch_chain(&self, peer: &str) -> PeerFetch {
        self.responses
            .get(peer)
            .cloned()
            .unwrap_or_else(|| PeerFetch::Unreachable(format!("{} is not serving", peer)))
    }
}
