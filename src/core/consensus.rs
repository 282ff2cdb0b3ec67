// Longest-valid-chain conflict resolution. Peers are polled in parallel, but
// candidates are judged strictly in peer order so the outcome does not depend
// on which peer answers first.

use crate::core::{verify_chain, Chain, ChainSnapshot, VerifyContext};
use crate::error::{LedgerError, Result};
use log::{info, warn};
use std::thread;

/// Where peer chains come from. Implementations bound their own latency.
pub trait PeerChainSource: Send + Sync {
    fn fetch_chain(&self, peer: &str) -> Result<ChainSnapshot>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A peer had a longer valid chain.
    Replaced(Chain),
    /// The local chain stays.
    Authoritative,
}

pub struct ConsensusResolver<'a> {
    trusted_genesis_hash: String,
    ctx: VerifyContext<'a>,
}

impl<'a> ConsensusResolver<'a> {
    pub fn new(trusted_genesis_hash: &str, ctx: VerifyContext<'a>) -> ConsensusResolver<'a> {
        ConsensusResolver {
            trusted_genesis_hash: trusted_genesis_hash.to_string(),
            ctx,
        }
    }

    pub fn resolve(
        &self,
        local: &Chain,
        peers: &[String],
        source: &dyn PeerChainSource,
    ) -> Resolution {
        let fetched = fetch_all(peers, source);

        let mut best: Option<Chain> = None;
        for (peer, result) in peers.iter().zip(fetched) {
            let snapshot = match result {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Skipping peer {peer}: {e}");
                    continue;
                }
            };
            let floor = best.as_ref().map_or(local.len(), Chain::len);
            if snapshot.length <= floor {
                continue;
            }
            match self.evaluate(snapshot) {
                Ok(chain) => {
                    info!("Peer {peer} offers a valid chain of length {}", chain.len());
                    best = Some(chain);
                }
                Err(e) => warn!("Rejecting chain from {peer}: {e}"),
            }
        }

        match best {
            Some(chain) => {
                info!(
                    "Replacing local chain of length {} with length {}",
                    local.len(),
                    chain.len()
                );
                Resolution::Replaced(chain)
            }
            None => {
                info!("Local chain of length {} is authoritative", local.len());
                Resolution::Authoritative
            }
        }
    }

    fn evaluate(&self, snapshot: ChainSnapshot) -> Result<Chain> {
        let chain = snapshot.into_chain()?;
        verify_chain(&chain, &self.trusted_genesis_hash, self.ctx)?;
        Ok(chain)
    }
}

// One scoped thread per peer; results come back in peer order.
fn fetch_all(peers: &[String], source: &dyn PeerChainSource) -> Vec<Result<ChainSnapshot>> {
    thread::scope(|scope| {
        let handles: Vec<_> = peers
            .iter()
            .map(|peer| scope.spawn(move || source.fetch_chain(peer)))
            .collect();
        handles
            .into_iter()
            .zip(peers)
            .map(|(handle, peer)| {
                handle.join().unwrap_or_else(|_| {
                    Err(LedgerError::Network(format!("Fetch from {peer} panicked")))
                })
            })
            .collect()
    })
}
