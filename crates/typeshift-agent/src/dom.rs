//! Minimal model of the document surface the agent touches.
//!
//! The agent only ever injects head nodes; the rest of the page is opaque
//! to it. Page scripts are free to wipe injected nodes at any time, which
//! is exactly what the mutation-driven re-apply path defends against.

use hashbrown::HashMap;

/// Handle to a node the agent injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

/// What kind of node was injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Inline stylesheet carrying generated CSS text.
    Style,
    /// External stylesheet link carrying a font URL.
    FontLink,
}

/// A head-injected node.
#[derive(Debug, Clone)]
pub struct InjectedNode {
    pub kind: NodeKind,
    /// CSS text for style nodes, href for font links.
    pub content: String,
}

/// The head of one page, as far as the agent is concerned.
#[derive(Debug, Default)]
pub struct PageDom {
    nodes: HashMap<NodeId, InjectedNode>,
    next_id: u64,
}

impl PageDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a node and hand back its handle.
    pub fn insert(&mut self, kind: NodeKind, content: impl Into<String>) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(
            id,
            InjectedNode {
                kind,
                content: content.into(),
            },
        );
        id
    }

    /// Remove a node. Removing an already-gone node is a no-op.
    pub fn remove(&mut self, id: NodeId) -> bool {
        self.nodes.remove(&id).is_some()
    }

    /// Whether a node is still present.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Look up a node.
    pub fn get(&self, id: NodeId) -> Option<&InjectedNode> {
        self.nodes.get(&id)
    }

    /// Number of injected nodes present.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Simulates a page script deleting every injected node.
    pub fn wipe(&mut self) {
        self.nodes.clear();
    }
}
