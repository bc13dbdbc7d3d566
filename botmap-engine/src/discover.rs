//! Node construction and outgoing-action discovery.

use std::sync::Arc;

use tracing::debug;

use botmap_core::action::Action;
use botmap_core::error::ExploreError;
use botmap_core::media::MediaFetcher;
use botmap_core::oracle::{TextOracle, TranscriptTurn};
use botmap_core::state::{NodeId, NodeStatus, StateStore};
use botmap_core::update::{InboundUpdate, Keyboard, MediaHandle, Response};

/// Builds state nodes: the synthetic bootstrap root, and one node per
/// finalized response with its outgoing actions discovered in fixed order.
pub struct NodeFactory {
    oracle: Arc<dyn TextOracle>,
    media: Arc<dyn MediaFetcher>,
    bootstrap_command: String,
}

impl NodeFactory {
    pub fn new(
        oracle: Arc<dyn TextOracle>,
        media: Arc<dyn MediaFetcher>,
        bootstrap_command: String,
    ) -> Self {
        Self {
            oracle,
            media,
            bootstrap_command,
        }
    }

    /// Create the root: no prior response, empty text, a single bootstrap
    /// stimulus out.
    pub fn bootstrap(&self, store: &mut StateStore) -> NodeId {
        store.insert(
            None,
            None,
            String::new(),
            None,
            NodeStatus::Ok,
            vec![Action::SendText {
                text: self.bootstrap_command.clone(),
            }],
        )
    }

    /// Create one node for a finalized response, attached under `parent`.
    ///
    /// `replay` suppresses the oracle consultation: replayed states carry no
    /// AI actions, reconciliation reinstates the recorded ones.
    pub async fn node_from_response(
        &self,
        store: &mut StateStore,
        parent: NodeId,
        action_in: Option<Action>,
        response: &Response,
        replay: bool,
    ) -> Result<NodeId, ExploreError> {
        match response {
            Response::Timeout => Ok(store.insert(
                Some(parent),
                action_in,
                String::new(),
                None,
                NodeStatus::Timeout,
                Vec::new(),
            )),
            Response::Update(update) => {
                let text = update.body_text().unwrap_or_default().to_string();
                let media = self.fetch_media(update).await;
                let actions_out = self
                    .discover_actions(store, parent, &action_in, &text, update, replay)
                    .await?;
                Ok(store.insert(
                    Some(parent),
                    action_in,
                    text,
                    media,
                    NodeStatus::Ok,
                    actions_out,
                ))
            }
        }
    }

    async fn fetch_media(&self, update: &InboundUpdate) -> Option<MediaHandle> {
        let media_ref = update.media.as_ref()?;
        match self.media.fetch(media_ref).await {
            Ok(handle) => Some(handle),
            Err(err) => {
                debug!(media = %media_ref, %err, "media fetch failed, continuing without");
                None
            }
        }
    }

    /// Fixed discovery order: the AI free-text probe first, then one action
    /// per keyboard button, row-major. Reply and inline keyboards never
    /// coexist on one update.
    async fn discover_actions(
        &self,
        store: &StateStore,
        parent: NodeId,
        action_in: &Option<Action>,
        text: &str,
        update: &InboundUpdate,
        replay: bool,
    ) -> Result<Vec<Action>, ExploreError> {
        let mut actions = Vec::new();

        if !text.is_empty() && !replay {
            let transcript = self.transcript(store, parent, action_in, text, &actions);
            let proposal = self.oracle.propose_reply(&transcript).await?;
            if proposal.expected && !proposal.text.is_empty() {
                actions.push(Action::SendAiText {
                    text: proposal.text,
                });
            }
        }

        match &update.keyboard {
            Some(Keyboard::Reply(rows)) => {
                for row in rows {
                    for button in row {
                        actions.push(Action::SendText {
                            text: button.clone(),
                        });
                    }
                }
            }
            Some(Keyboard::Inline(rows)) => {
                for row in rows {
                    for button in row {
                        actions.push(Action::PushInlineButton {
                            text: button.text.clone(),
                            message: update.message,
                            payload: button.payload.clone(),
                        });
                    }
                }
            }
            None => {}
        }

        Ok(actions)
    }

    /// Transcript triples along root→parent (root excluded), plus the
    /// pending turn under construction.
    fn transcript(
        &self,
        store: &StateStore,
        parent: NodeId,
        action_in: &Option<Action>,
        text: &str,
        actions: &[Action],
    ) -> Vec<TranscriptTurn> {
        let mut turns = Vec::new();
        for id in store.path(parent).into_iter().skip(1) {
            let node = store.node(id);
            turns.push(TranscriptTurn {
                action_in: node.action_in.as_ref().map(ToString::to_string),
                bot_text: node.text.clone(),
                actions_out: node.actions_out.iter().map(ToString::to_string).collect(),
            });
        }
        turns.push(TranscriptTurn {
            action_in: action_in.as_ref().map(ToString::to_string),
            bot_text: text.to_string(),
            actions_out: actions.iter().map(ToString::to_string).collect(),
        });
        turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{self, NullMediaFetcher, ScriptedOracle, StaticMediaFetcher};
    use botmap_core::update::MediaRef;

    fn factory(oracle: ScriptedOracle) -> NodeFactory {
        NodeFactory::new(
            Arc::new(oracle),
            Arc::new(NullMediaFetcher),
            "/start".into(),
        )
    }

    #[test]
    fn bootstrap_creates_the_root_shape() {
        let mut store = StateStore::new();
        let root = factory(ScriptedOracle::declining()).bootstrap(&mut store);

        let node = store.node(root);
        assert_eq!(node.parent, None);
        assert_eq!(node.action_in, None);
        assert_eq!(node.text, "");
        assert_eq!(node.status, NodeStatus::Ok);
        assert_eq!(
            node.actions_out,
            vec![Action::SendText { text: "/start".into() }]
        );
    }

    #[tokio::test]
    async fn timeout_marker_yields_terminal_node() {
        let factory = factory(ScriptedOracle::declining());
        let mut store = StateStore::new();
        let root = factory.bootstrap(&mut store);

        let id = factory
            .node_from_response(
                &mut store,
                root,
                Some(Action::SendText { text: "/start".into() }),
                &Response::Timeout,
                false,
            )
            .await
            .unwrap();

        let node = store.node(id);
        assert_eq!(node.status, NodeStatus::Timeout);
        assert_eq!(node.text, "");
        assert!(node.actions_out.is_empty());
    }

    #[tokio::test]
    async fn reply_keyboard_enumerates_row_major() {
        let factory = factory(ScriptedOracle::declining());
        let mut store = StateStore::new();
        let root = factory.bootstrap(&mut store);

        let update = mock::reply_keyboard_update(
            7,
            "choose",
            &[&["One", "Two"], &["Three"]],
        );
        let id = factory
            .node_from_response(
                &mut store,
                root,
                Some(Action::SendText { text: "/start".into() }),
                &Response::Update(update),
                false,
            )
            .await
            .unwrap();

        let texts: Vec<_> = store
            .node(id)
            .actions_out
            .iter()
            .map(|a| a.text().to_string())
            .collect();
        assert_eq!(texts, vec!["One", "Two", "Three"]);
        assert!(store.node(id).actions_out.iter().all(|a| !a.is_ai()));
    }

    #[tokio::test]
    async fn inline_keyboard_carries_message_reference_and_payload() {
        let factory = factory(ScriptedOracle::declining());
        let mut store = StateStore::new();
        let root = factory.bootstrap(&mut store);

        let update =
            mock::inline_keyboard_update(42, "pick", &[&[("Buy", "buy"), ("Help", "help")]]);
        let id = factory
            .node_from_response(
                &mut store,
                root,
                Some(Action::SendText { text: "/start".into() }),
                &Response::Update(update),
                false,
            )
            .await
            .unwrap();

        let actions = &store.node(id).actions_out;
        assert_eq!(actions.len(), 2);
        match &actions[0] {
            Action::PushInlineButton {
                text,
                message,
                payload,
            } => {
                assert_eq!(text, "Buy");
                assert_eq!(message.0, 42);
                assert_eq!(payload.callback_data.as_deref(), Some("buy"));
            }
            other => panic!("expected inline button, got {other}"),
        }
    }

    #[tokio::test]
    async fn oracle_proposal_prepends_ai_action() {
        let oracle = ScriptedOracle::declining();
        oracle.propose_for("What is your name?", "Max Ivanov");
        let factory = factory(oracle);
        let mut store = StateStore::new();
        let root = factory.bootstrap(&mut store);

        let update = mock::reply_keyboard_update(3, "What is your name?", &[&["Skip"]]);
        let id = factory
            .node_from_response(
                &mut store,
                root,
                Some(Action::SendText { text: "/start".into() }),
                &Response::Update(update),
                false,
            )
            .await
            .unwrap();

        let actions = &store.node(id).actions_out;
        assert_eq!(
            actions[0],
            Action::SendAiText { text: "Max Ivanov".into() }
        );
        assert_eq!(actions[1], Action::SendText { text: "Skip".into() });
    }

    #[tokio::test]
    async fn declined_or_empty_proposal_adds_no_action() {
        let oracle = ScriptedOracle::declining();
        oracle.propose_for("done", "");
        let factory = factory(oracle);
        let mut store = StateStore::new();
        let root = factory.bootstrap(&mut store);

        let update = mock::text_update(3, "done");
        let id = factory
            .node_from_response(
                &mut store,
                root,
                Some(Action::SendText { text: "/start".into() }),
                &Response::Update(update),
                false,
            )
            .await
            .unwrap();

        assert!(store.node(id).actions_out.is_empty());
    }

    #[tokio::test]
    async fn replay_skips_the_oracle() {
        let oracle = ScriptedOracle::declining();
        oracle.propose_for("What is your name?", "Max Ivanov");
        let factory = factory(oracle);
        let mut store = StateStore::new();
        let root = factory.bootstrap(&mut store);

        let update = mock::text_update(3, "What is your name?");
        let id = factory
            .node_from_response(
                &mut store,
                root,
                Some(Action::SendText { text: "/start".into() }),
                &Response::Update(update),
                true,
            )
            .await
            .unwrap();

        assert!(store.node(id).actions_out.is_empty());
    }

    #[tokio::test]
    async fn transcript_reaches_the_oracle_with_path_context() {
        let oracle = Arc::new(ScriptedOracle::declining());
        let factory = NodeFactory::new(
            oracle.clone(),
            Arc::new(NullMediaFetcher),
            "/start".into(),
        );
        let mut store = StateStore::new();
        let root = factory.bootstrap(&mut store);

        let first = factory
            .node_from_response(
                &mut store,
                root,
                Some(Action::SendText { text: "/start".into() }),
                &Response::Update(mock::text_update(1, "welcome")),
                false,
            )
            .await
            .unwrap();
        factory
            .node_from_response(
                &mut store,
                first,
                Some(Action::SendText { text: "go".into() }),
                &Response::Update(mock::text_update(2, "second prompt")),
                false,
            )
            .await
            .unwrap();

        let transcripts = oracle.transcripts();
        // Second consultation saw the first turn plus the pending one.
        let last = transcripts.last().unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].bot_text, "welcome");
        assert_eq!(last[1].bot_text, "second prompt");
        assert_eq!(last[1].action_in.as_deref(), Some("send_text: go"));
    }

    #[tokio::test]
    async fn media_failure_degrades_to_no_media() {
        let factory = factory(ScriptedOracle::declining());
        let mut store = StateStore::new();
        let root = factory.bootstrap(&mut store);

        let mut update = mock::text_update(5, "photo incoming");
        update.media = Some(MediaRef("file-123".into()));
        let id = factory
            .node_from_response(
                &mut store,
                root,
                Some(Action::SendText { text: "/start".into() }),
                &Response::Update(update),
                false,
            )
            .await
            .unwrap();

        assert!(store.node(id).media.is_none());
    }

    #[tokio::test]
    async fn fetched_media_is_recorded() {
        let factory = NodeFactory::new(
            Arc::new(ScriptedOracle::declining()),
            Arc::new(StaticMediaFetcher::new("/tmp/artifacts")),
            "/start".into(),
        );
        let mut store = StateStore::new();
        let root = factory.bootstrap(&mut store);

        let mut update = mock::text_update(5, "photo incoming");
        update.media = Some(MediaRef("file-123".into()));
        let id = factory
            .node_from_response(
                &mut store,
                root,
                Some(Action::SendText { text: "/start".into() }),
                &Response::Update(update),
                false,
            )
            .await
            .unwrap();

        assert_eq!(
            store.node(id).media.as_ref().map(|m| m.0.as_str()),
            Some("/tmp/artifacts/file-123")
        );
    }
}
