use crate::error::{LedgerError, Result};
use std::net::SocketAddr;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    addr: String,
}

impl Node {
    fn new(addr: String) -> Node {
        Node { addr }
    }

    pub fn get_addr(&self) -> &str {
        self.addr.as_str()
    }

    pub fn parse_socket_addr(&self) -> Result<SocketAddr> {
        self.addr
            .parse()
            .map_err(|e| LedgerError::Network(format!("Invalid node address {}: {e}", self.addr)))
    }
}

/// Registered peers, in registration order.
#[derive(Debug, Default)]
pub struct Nodes {
    inner: RwLock<Vec<Node>>,
}

impl Nodes {
    pub fn new() -> Nodes {
        Nodes::default()
    }

    /// Registers `addr` unless it is already known. Returns whether it was new.
    pub fn add_node(&self, addr: &str) -> Result<bool> {
        let node = Node::new(addr.to_string());
        node.parse_socket_addr()?;
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.contains(&node) {
            return Ok(false);
        }
        inner.push(node);
        Ok(true)
    }

    pub fn evict_node(&self, addr: &str) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.retain(|node| node.get_addr() != addr);
    }

    pub fn get_nodes(&self) -> Vec<Node> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_vec()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.get_nodes()
            .into_iter()
            .map(|node| node.addr)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node_is_known(&self, addr: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|node| node.get_addr() == addr)
    }
}
