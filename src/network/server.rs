use crate::config::Settings;
use crate::core::{Block, CancellationToken, ChainSnapshot, Ledger, Resolution, Transaction};
use crate::error::{LedgerError, Result};
use crate::network::{Nodes, TcpPeerSource};
use crate::storage::ChainStore;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Deserializer;
use std::io::{BufReader, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const TCP_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// One request per connection; the server answers with one [`Response`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    GetChain,
    SubmitTransaction {
        addr_from: String,
        transaction: Transaction,
    },
    RegisterNodes {
        nodes: Vec<String>,
    },
    GetNodes,
    Resolve,
    /// Mine the pending pool now, paying `miner`.
    Mine {
        miner: String,
    },
    Balance {
        address: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Chain(ChainSnapshot),
    Accepted { hash: String },
    Registered { nodes: Vec<String> },
    Nodes { nodes: Vec<String> },
    Resolved { replaced: bool, length: usize },
    Mined { block: Block, length: usize },
    Balance { address: String, balance: u64 },
    Error { message: String },
}

struct NodeContext {
    ledger: Arc<Ledger>,
    nodes: Nodes,
    store: ChainStore,
    peers: TcpPeerSource,
    mining_address: Option<String>,
    mining_threshold: usize,
    mining: AtomicBool,
}

/// A ledger node serving peers over TCP, one thread per connection.
#[derive(Clone)]
pub struct Server {
    ctx: Arc<NodeContext>,
}

impl Server {
    pub fn new(ledger: Arc<Ledger>, store: ChainStore, settings: &Settings) -> Server {
        Server {
            ctx: Arc::new(NodeContext {
                ledger,
                nodes: Nodes::new(),
                store,
                peers: TcpPeerSource::new(Duration::from_millis(settings.peer_timeout_ms)),
                mining_address: settings.mining_address.clone(),
                mining_threshold: settings.mining_threshold,
                mining: AtomicBool::new(false),
            }),
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ctx.ledger
    }

    pub fn nodes(&self) -> &Nodes {
        &self.ctx.nodes
    }

    pub fn run(&self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| LedgerError::Network(format!("Failed to bind to {addr}: {e}")))?;
        info!("Server listening on {addr}");
        self.serve(listener);
        Ok(())
    }

    /// Accepts connections on `listener` until it fails.
    pub fn serve(&self, listener: TcpListener) {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let ctx = Arc::clone(&self.ctx);
                    thread::spawn(move || {
                        if let Err(e) = Self::handle_connection(&ctx, stream) {
                            error!("Error handling connection: {e}");
                        }
                    });
                }
                Err(e) => error!("Error accepting connection: {e}"),
            }
        }
    }

    fn handle_connection(ctx: &Arc<NodeContext>, mut stream: TcpStream) -> Result<()> {
        stream
            .set_read_timeout(Some(TCP_READ_TIMEOUT))
            .map_err(|e| LedgerError::Network(format!("Failed to set read timeout: {e}")))?;
        let peer_addr = stream.peer_addr()?;

        let request = Deserializer::from_reader(BufReader::new(&stream))
            .into_iter::<Request>()
            .next()
            .ok_or_else(|| LedgerError::Network(format!("{peer_addr} sent no request")))?
            .map_err(|e| LedgerError::Network(format!("Failed to read request: {e}")))?;
        info!("Received request from {peer_addr}: {}", request_name(&request));

        let response = match Self::process_request(ctx, request) {
            Ok(response) => response,
            Err(e) => {
                warn!("Request from {peer_addr} failed: {e}");
                Response::Error {
                    message: e.to_string(),
                }
            }
        };
        serde_json::to_writer(&stream, &response)
            .map_err(|e| LedgerError::Network(format!("Failed to send response: {e}")))?;
        stream.flush()?;
        let _ = stream.shutdown(Shutdown::Both);
        Ok(())
    }

    fn process_request(ctx: &Arc<NodeContext>, request: Request) -> Result<Response> {
        match request {
            Request::GetChain => Ok(Response::Chain(ctx.ledger.snapshot())),
            Request::SubmitTransaction {
                addr_from,
                transaction,
            } => {
                let hash = ctx.ledger.submit_transaction(transaction)?;
                info!("Transaction {hash} submitted by {addr_from}");
                ctx.store.save_pending(&ctx.ledger.state().pending)?;
                Self::maybe_mine(ctx);
                Ok(Response::Accepted { hash })
            }
            Request::RegisterNodes { nodes } => {
                for node in &nodes {
                    if ctx.nodes.add_node(node)? {
                        info!("Registered peer {node}");
                    }
                }
                Ok(Response::Registered {
                    nodes: ctx.nodes.addresses(),
                })
            }
            Request::GetNodes => Ok(Response::Nodes {
                nodes: ctx.nodes.addresses(),
            }),
            Request::Mine { miner } => {
                let block = ctx.ledger.mine_pending(&miner, CancellationToken::new())?;
                info!("Mined block {} on request", block.get_hash());
                Self::persist(ctx)?;
                Ok(Response::Mined {
                    block,
                    length: ctx.ledger.len(),
                })
            }
            Request::Balance { address } => {
                let balance = ctx.ledger.balance(&address)?;
                Ok(Response::Balance { address, balance })
            }
            Request::Resolve => {
                let resolution = ctx.ledger.resolve(&ctx.nodes.addresses(), &ctx.peers)?;
                let replaced = matches!(resolution, Resolution::Replaced(_));
                if replaced {
                    Self::persist(ctx)?;
                }
                Ok(Response::Resolved {
                    replaced,
                    length: ctx.ledger.len(),
                })
            }
        }
    }

    // Starts a background mining job once enough transactions are pending.
    fn maybe_mine(ctx: &Arc<NodeContext>) {
        let miner = match &ctx.mining_address {
            Some(miner) => miner.clone(),
            None => return,
        };
        if ctx.ledger.pending_len() < ctx.mining_threshold {
            return;
        }
        if ctx.mining.swap(true, Ordering::SeqCst) {
            return;
        }

        let ctx = Arc::clone(ctx);
        thread::spawn(move || {
            match ctx.ledger.mine_pending(&miner, CancellationToken::new()) {
                Ok(block) => {
                    info!("New block {} is mined!", block.get_hash());
                    if let Err(e) = Self::persist(&ctx) {
                        error!("Failed to persist mined block: {e}");
                    }
                }
                Err(e) => warn!("Mining attempt failed: {e}"),
            }
            ctx.mining.store(false, Ordering::SeqCst);
        });
    }

    fn persist(ctx: &NodeContext) -> Result<()> {
        let state = ctx.ledger.state();
        ctx.store.save_chain(&state.chain)?;
        ctx.store.save_pending(&state.pending)
    }
}

fn request_name(request: &Request) -> &'static str {
    match request {
        Request::GetChain => "get_chain",
        Request::SubmitTransaction { .. } => "submit_transaction",
        Request::RegisterNodes { .. } => "register_nodes",
        Request::GetNodes => "get_nodes",
        Request::Resolve => "resolve",
        Request::Mine { .. } => "mine",
        Request::Balance { .. } => "balance",
    }
}
