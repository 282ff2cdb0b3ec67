//! Peer-to-peer networking
//!
//! JSON request/response messages over TCP: nodes serve their chain, accept
//! transactions, learn about peers, and resolve conflicts against them.

pub mod node;
pub mod peer;
pub mod server;

pub use node::{Node, Nodes};
pub use peer::{send_request, TcpPeerSource};
pub use server::{Request, Response, Server};
