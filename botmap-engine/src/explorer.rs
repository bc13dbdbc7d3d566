//! Depth-first traversal and path-replay over the discovered state tree.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use botmap_core::action::Action;
use botmap_core::config::ExplorerConfig;
use botmap_core::error::{ExploreError, ModelError};
use botmap_core::media::MediaFetcher;
use botmap_core::oracle::TextOracle;
use botmap_core::snapshot::{SnapshotRow, SnapshotSink};
use botmap_core::state::{NodeId, NodeStatus, StateStore};
use botmap_core::transport::Transport;
use botmap_core::update::TargetId;

use crate::collector::ResponseCollector;
use crate::discover::NodeFactory;
use crate::rate::RateController;

/// Optional hook invoked at the start of every restore to reset
/// provider-side conversation state.
#[async_trait]
pub trait ResetHook: Send + Sync {
    async fn reset(&self);
}

/// Where the engine currently is in its traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    Expanding(NodeId),
    Restoring(NodeId),
}

/// Drives the exploration of a target bot: `test` expands states depth-first
/// with loop detection, `restore` repositions the live conversational cursor
/// by replaying a recorded path.
///
/// One stimulus is in flight at any time; the cursor, the rate window and
/// the store have this single instance as their only owner.
pub struct Explorer {
    config: ExplorerConfig,
    store: StateStore,
    rate: RateController,
    collector: ResponseCollector,
    factory: NodeFactory,
    reset: Option<Arc<dyn ResetHook>>,
    cursor: NodeId,
    phase: EnginePhase,
}

impl Explorer {
    /// Validate the config, bootstrap the root and assemble the engine.
    pub fn new(
        config: ExplorerConfig,
        transport: Arc<dyn Transport>,
        oracle: Arc<dyn TextOracle>,
        media: Arc<dyn MediaFetcher>,
    ) -> Result<Self, ExploreError> {
        config.validate()?;

        let collector = ResponseCollector::new(
            transport,
            TargetId(config.target.clone()),
            config.response_timeout(),
        );
        let factory = NodeFactory::new(oracle, media, config.bootstrap_command.clone());
        let rate = RateController::new(config.min_wait());

        let mut store = StateStore::new();
        let cursor = factory.bootstrap(&mut store);

        Ok(Self {
            config,
            store,
            rate,
            collector,
            factory,
            reset: None,
            cursor,
            phase: EnginePhase::Idle,
        })
    }

    /// Attach the snapshot hook fired by the rate controller on backoff.
    pub fn with_snapshot_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.rate = self.rate.with_snapshot_sink(sink);
        self
    }

    /// Attach a hook run before every restore.
    pub fn with_reset_hook(mut self, hook: Arc<dyn ResetHook>) -> Self {
        self.reset = Some(hook);
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn cursor(&self) -> NodeId {
        self.cursor
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Flattened read-only view of the discovered tree, for snapshot hooks.
    pub fn snapshot_rows(&self) -> Vec<SnapshotRow> {
        self.store.flatten()
    }

    /// Explore the whole reachable space from the bootstrap root.
    pub async fn run(&mut self) -> Result<NodeId, ExploreError> {
        let root = self.root();
        info!(target = %self.config.target, "starting exploration");
        self.test(root).await?;
        self.phase = EnginePhase::Idle;
        info!(states = self.store.len(), "exploration finished");
        Ok(root)
    }

    /// Expand `node`: attempt every outgoing action in order, recursing into
    /// newly discovered children within the depth bound.
    ///
    /// A failed restore abandons this branch and its untried siblings;
    /// branches completed earlier stay in the tree.
    pub async fn test(&mut self, node: NodeId) -> Result<(), ExploreError> {
        self.phase = EnginePhase::Expanding(node);
        debug!(
            node = %node,
            actions = self.store.node(node).actions_out.len(),
            "expanding state"
        );

        // By index: restore reconciliation may rewrite `actions_out` in
        // place, but never changes its length.
        for index in 0..self.store.node(node).actions_out.len() {
            if self.cursor != node {
                if !self.restore(node).await? {
                    return Ok(());
                }
                self.phase = EnginePhase::Expanding(node);
            }

            let action = self.store.node(node).actions_out[index].clone();
            let produced = self
                .collector
                .perform(
                    &mut self.store,
                    &mut self.rate,
                    &self.factory,
                    self.cursor,
                    &action,
                    false,
                )
                .await?;
            // Fan-out supported: only the terminal state of the chain is
            // evaluated.
            let Some(&candidate) = produced.last() else {
                continue;
            };

            let repeats = self.store.count_on_path(node, candidate);
            if repeats >= self.config.max_repeats {
                debug!(
                    node = %candidate,
                    repeats,
                    "state repeated along the current branch, pruning"
                );
                self.store.node_mut(candidate).status = NodeStatus::Loop;
                self.cursor = candidate;
                continue;
            }

            self.cursor = candidate;

            let recurse = {
                let state = self.store.node(candidate);
                state.status != NodeStatus::Timeout
                    && !self.store.value_eq(candidate, node)
                    && !state.actions_out.is_empty()
                    && self.store.depth(candidate) < self.config.max_depth
            };
            if recurse {
                self.test_boxed(candidate).await?;
                self.phase = EnginePhase::Expanding(node);
            }
        }
        Ok(())
    }

    fn test_boxed<'a>(
        &'a mut self,
        node: NodeId,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExploreError>> + Send + 'a>> {
        Box::pin(self.test(node))
    }

    /// Replay the root→target path to reposition the live cursor at
    /// `target`.
    ///
    /// Returns `Ok(false)` when the live bot diverges from the recorded
    /// path: the probe state that failed to match keeps a diagnostic text
    /// and an emptied action list, and completed branches stay intact.
    pub async fn restore(&mut self, target: NodeId) -> Result<bool, ExploreError> {
        self.phase = EnginePhase::Restoring(target);
        debug!(target = %target, "restoring state");

        if let Some(reset) = &self.reset {
            reset.reset().await;
        }

        let path = self.store.path(target);
        self.cursor = path[0];

        let mut position = 0;
        while position + 1 < path.len() {
            let next = path[position + 1];
            let Some(recorded) = self.store.node(next).action_in.clone() else {
                // Passive hop: produced by a later update of the previous
                // stimulus, nothing to perform.
                debug!(node = %next, "skipping passive state");
                self.cursor = next;
                position += 1;
                continue;
            };

            // Object identity is not preserved across runs: the recorded
            // action is located by value in the live node's current actions.
            let live_action = self
                .store
                .node(self.cursor)
                .actions_out
                .iter()
                .find(|a| **a == recorded)
                .cloned();
            let Some(live_action) = live_action else {
                warn!(
                    node = %self.cursor,
                    action = %recorded,
                    "recorded action no longer offered, abandoning restore"
                );
                return Ok(false);
            };

            let produced = self
                .collector
                .perform(
                    &mut self.store,
                    &mut self.rate,
                    &self.factory,
                    self.cursor,
                    &live_action,
                    true,
                )
                .await?;
            let chain = produced.len();
            let Some(&replayed) = produced.last() else {
                return Ok(false);
            };

            let expected = path
                .get(position + chain)
                .copied()
                .filter(|&id| self.store.value_eq(replayed, id));
            let Some(expected) = expected else {
                let recorded_state = path.get(position + chain).copied().unwrap_or(next);
                let message = format!(
                    "failed to restore state {recorded_state}, got state {replayed} instead"
                );
                warn!(
                    expected = %recorded_state,
                    replayed = %replayed,
                    "replay diverged from the recorded path"
                );
                let probe = self.store.node_mut(replayed);
                probe.text = message;
                probe.actions_out.clear();
                return Ok(false);
            };

            // Fresh transient identifiers from the replay supersede the
            // recorded ones; the probe chain itself is never kept.
            let fresh_actions = self.store.node(replayed).actions_out.clone();
            let fresh_action_in = self.store.node(replayed).action_in.clone();
            self.store.discard_tail(chain);

            self.reconcile(expected, &fresh_actions)?;
            self.store.node_mut(expected).action_in = fresh_action_in;

            self.cursor = expected;
            position += chain;
        }

        debug!(target = %target, "state restored");
        Ok(true)
    }

    /// Rewrite `target`'s non-AI actions with their freshly observed
    /// counterparts, keeping AI actions at their original indices.
    ///
    /// AI stimuli cannot be meaningfully replayed, so a replayed state never
    /// carries them; the recorded ones are reinstated unchanged. Any
    /// disagreement between the stripped lists breaks the equality/ordering
    /// invariant and is a hard error.
    fn reconcile(&mut self, target: NodeId, fresh: &[Action]) -> Result<(), ExploreError> {
        let node = self.store.node_mut(target);

        let preserved: Vec<(usize, Action)> = node
            .actions_out
            .iter()
            .enumerate()
            .filter(|(_, action)| action.is_ai())
            .map(|(index, action)| (index, action.clone()))
            .collect();
        let mut rewritten: Vec<Action> = node
            .actions_out
            .iter()
            .filter(|action| !action.is_ai())
            .cloned()
            .collect();
        let replayed: Vec<&Action> = fresh.iter().filter(|action| !action.is_ai()).collect();

        if rewritten.len() != replayed.len() {
            return Err(ModelError::ReconcileArity {
                recorded: rewritten.len(),
                replayed: replayed.len(),
            }
            .into());
        }
        for (position, (recorded, new)) in rewritten.iter_mut().zip(replayed).enumerate() {
            if *recorded != *new {
                return Err(ModelError::ReconcileMismatch {
                    position,
                    recorded: recorded.to_string(),
                    replayed: new.to_string(),
                }
                .into());
            }
            *recorded = new.clone();
        }
        for (index, action) in preserved {
            let at = index.min(rewritten.len());
            rewritten.insert(at, action);
        }
        node.actions_out = rewritten;
        Ok(())
    }
}
