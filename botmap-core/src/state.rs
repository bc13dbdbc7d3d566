//! Discovered conversational states and the flat, id-indexed tree store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::snapshot::SnapshotRow;
use crate::update::MediaHandle;

/// Identifier of a node in the discovered tree.
///
/// Strictly increasing in creation order. Ids of discarded replay probes are
/// reclaimed by subsequent insertions; retained nodes keep unique ids.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(u64);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn value(self) -> u64 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a discovered state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Ok,
    /// No inbound update arrived inside the response window. Never expanded.
    Timeout,
    /// The state recurred along its branch at least `max_repeats` times.
    /// Never expanded, even though `actions_out` may be non-empty.
    Loop,
}

/// One discovered conversational state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateNode {
    pub id: NodeId,
    /// None only for the root.
    pub parent: Option<NodeId>,
    /// Insertion order is discovery order.
    pub children: Vec<NodeId>,
    /// The stimulus whose execution produced this state. None for the root
    /// and for passive hops of a multi-update response chain.
    pub action_in: Option<Action>,
    pub text: String,
    pub media: Option<MediaHandle>,
    pub status: NodeStatus,
    /// Computed once at creation; later rewritten in place only by restore
    /// reconciliation.
    pub actions_out: Vec<Action>,
    pub discovered_at: DateTime<Utc>,
}

impl StateNode {
    /// Value equality across independent traversals: same producing action
    /// and pairwise-equal non-AI outgoing actions, in order.
    ///
    /// AI-generated actions differ every run and are excluded; `text` and
    /// `status` are likewise not part of the state's identity.
    pub fn value_eq(&self, other: &StateNode) -> bool {
        if self.action_in != other.action_in {
            return false;
        }
        let ours = self.actions_out.iter().filter(|a| !a.is_ai());
        let theirs = other.actions_out.iter().filter(|a| !a.is_ai());
        ours.eq(theirs)
    }
}

/// Flat, id-indexed store holding the discovered tree.
///
/// Nodes hold a non-owning parent id and an owning ordered child-id list;
/// the path from root to any node is unique.
#[derive(Debug, Default, Clone)]
pub struct StateStore {
    nodes: Vec<StateNode>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a node and link it under `parent`. The id is assigned here and
    /// is strictly greater than every id currently in the store.
    pub fn insert(
        &mut self,
        parent: Option<NodeId>,
        action_in: Option<Action>,
        text: String,
        media: Option<MediaHandle>,
        status: NodeStatus,
        actions_out: Vec<Action>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        if let Some(parent_id) = parent {
            self.nodes[parent_id.index()].children.push(id);
        }
        self.nodes.push(StateNode {
            id,
            parent,
            children: Vec::new(),
            action_in,
            text,
            media,
            status,
            actions_out,
            discovered_at: Utc::now(),
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &StateNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut StateNode {
        &mut self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&StateNode> {
        self.nodes.get(id.index())
    }

    /// Root-to-node path, inclusive.
    pub fn path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Distance from the root; the root itself is at depth 0.
    pub fn depth(&self, id: NodeId) -> usize {
        self.path(id).len() - 1
    }

    pub fn value_eq(&self, a: NodeId, b: NodeId) -> bool {
        self.node(a).value_eq(self.node(b))
    }

    /// Value-equal occurrences of `probe` among the nodes on the path from
    /// root to `node`, inclusive.
    pub fn count_on_path(&self, node: NodeId, probe: NodeId) -> usize {
        self.path(node)
            .into_iter()
            .filter(|&id| self.value_eq(id, probe))
            .count()
    }

    /// Detach and drop the `count` most recently created nodes.
    ///
    /// Used to discard replay probes; their ids are reclaimed by subsequent
    /// insertions. Callers must ensure the tail nodes have no children
    /// outside the tail — probes are always discarded before anything is
    /// attached below them.
    pub fn discard_tail(&mut self, count: usize) {
        for _ in 0..count {
            let Some(node) = self.nodes.pop() else {
                return;
            };
            if let Some(parent_id) = node.parent {
                self.nodes[parent_id.index()]
                    .children
                    .retain(|&child| child != node.id);
            }
        }
    }

    /// Read-only flattened view for snapshot consumers.
    pub fn flatten(&self) -> Vec<SnapshotRow> {
        self.nodes
            .iter()
            .map(|node| SnapshotRow {
                id: node.id.value(),
                parent_id: node.parent.map(NodeId::value),
                action_in: node.action_in.as_ref().map(ToString::to_string),
                status: node.status,
                text: node.text.clone(),
                media_ref: node.media.as_ref().map(ToString::to_string),
                actions_out: node.actions_out.iter().map(ToString::to_string).collect(),
            })
            .collect()
    }
}
