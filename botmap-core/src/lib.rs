//! Core data model and boundary contracts for botmap, an explorer that maps
//! the reachable conversational states of a black-box chat bot.

pub mod action;
pub mod config;
pub mod error;
pub mod media;
pub mod oracle;
pub mod snapshot;
pub mod state;
pub mod transport;
pub mod update;

pub use action::{Action, ActionKind, ButtonPayload, MessageRef};
pub use config::ExplorerConfig;
pub use error::{
    ConfigError, ExploreError, MediaError, ModelError, OracleError, TransportError,
};
pub use media::MediaFetcher;
pub use oracle::{ReplyProposal, TextOracle, TranscriptTurn};
pub use snapshot::{SnapshotRow, SnapshotSink};
pub use state::{NodeId, NodeStatus, StateNode, StateStore};
pub use transport::{Subscription, SubscriptionId, Transport, UpdateFilter};
pub use update::{
    InboundUpdate, InlineButton, Keyboard, MediaHandle, MediaRef, Response, TargetId,
};
