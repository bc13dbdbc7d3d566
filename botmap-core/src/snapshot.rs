//! Flattened read-only tree view consumed by snapshot hooks.

use serde::Serialize;

use crate::state::NodeStatus;

/// One node of the flattened tree view.
///
/// Action fields are display summaries (`"send_text: /start"`); the engine
/// owns no serialization format beyond this shape.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRow {
    pub id: u64,
    pub parent_id: Option<u64>,
    pub action_in: Option<String>,
    pub status: NodeStatus,
    pub text: String,
    pub media_ref: Option<String>,
    pub actions_out: Vec<String>,
}

/// Consumer of flattened tree views.
///
/// Fired by the rate controller when the provider mandates a backoff; hosts
/// may also pull `Explorer::snapshot_rows` after any traversal step and feed
/// the same sink.
pub trait SnapshotSink: Send + Sync {
    fn snapshot(&self, rows: &[SnapshotRow]);
}
