use crate::core::{ChainSnapshot, PeerChainSource};
use crate::error::{LedgerError, Result};
use crate::network::{Request, Response};
use log::debug;
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

/// Sends one request to `addr` and waits for its response. The timeout
/// bounds connecting, writing and reading separately.
pub fn send_request(addr: &str, request: &Request, timeout: Duration) -> Result<Response> {
    let socket_addr = addr
        .parse::<SocketAddr>()
        .map_err(|e| LedgerError::Network(format!("Invalid address {addr}: {e}")))?;
    debug!("Sending {request:?} to {addr}");

    let mut stream = TcpStream::connect_timeout(&socket_addr, timeout)
        .map_err(|e| LedgerError::Network(format!("Failed to connect to {addr}: {e}")))?;
    stream
        .set_write_timeout(Some(timeout))
        .and_then(|_| stream.set_read_timeout(Some(timeout)))
        .map_err(|e| LedgerError::Network(format!("Failed to set timeouts: {e}")))?;

    serde_json::to_writer(&stream, request)
        .map_err(|e| LedgerError::Network(format!("Failed to send request to {addr}: {e}")))?;
    stream.flush()?;
    let _ = stream.shutdown(Shutdown::Write);

    serde_json::from_reader(BufReader::new(&stream))
        .map_err(|e| LedgerError::Network(format!("Bad response from {addr}: {e}")))
}

/// Fetches peer chains over TCP.
#[derive(Debug, Clone)]
pub struct TcpPeerSource {
    timeout: Duration,
}

impl TcpPeerSource {
    pub fn new(timeout: Duration) -> TcpPeerSource {
        TcpPeerSource { timeout }
    }
}

impl PeerChainSource for TcpPeerSource {
    fn fetch_chain(&self, peer: &str) -> Result<ChainSnapshot> {
        match send_request(peer, &Request::GetChain, self.timeout)? {
            Response::Chain(snapshot) => Ok(snapshot),
            Response::Error { message } => Err(LedgerError::Network(message)),
            other => Err(LedgerError::Network(format!(
                "Unexpected response from {peer}: {other:?}"
            ))),
        }
    }
}
