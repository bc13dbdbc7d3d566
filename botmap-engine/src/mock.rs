//! Scripted test doubles for the engine's external collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use botmap_core::action::{ButtonPayload, MessageRef};
use botmap_core::error::{MediaError, OracleError, TransportError};
use botmap_core::media::MediaFetcher;
use botmap_core::oracle::{ReplyProposal, TextOracle, TranscriptTurn};
use botmap_core::snapshot::{SnapshotRow, SnapshotSink};
use botmap_core::transport::{Subscription, SubscriptionId, Transport, UpdateFilter};
use botmap_core::update::{
    InboundUpdate, InlineButton, Keyboard, MediaHandle, MediaRef, TargetId,
};

use crate::explorer::ResetHook;

/// Plain text update with `message_id` doubling as the sequence key.
pub fn text_update(message_id: i64, text: &str) -> InboundUpdate {
    InboundUpdate {
        message: MessageRef(message_id),
        sequence: Some(message_id),
        text: Some(text.to_string()),
        caption: None,
        media: None,
        keyboard: None,
    }
}

/// Text update carrying a reply keyboard, rows given row-major.
pub fn reply_keyboard_update(message_id: i64, text: &str, rows: &[&[&str]]) -> InboundUpdate {
    let mut update = text_update(message_id, text);
    update.keyboard = Some(Keyboard::Reply(
        rows.iter()
            .map(|row| row.iter().map(|b| b.to_string()).collect())
            .collect(),
    ));
    update
}

/// Text update carrying an inline keyboard of `(label, callback_data)` pairs.
pub fn inline_keyboard_update(
    message_id: i64,
    text: &str,
    rows: &[&[(&str, &str)]],
) -> InboundUpdate {
    let mut update = text_update(message_id, text);
    update.keyboard = Some(Keyboard::Inline(
        rows.iter()
            .map(|row| {
                row.iter()
                    .map(|(label, data)| InlineButton {
                        text: label.to_string(),
                        payload: ButtonPayload {
                            callback_data: Some(data.to_string()),
                            ..Default::default()
                        },
                    })
                    .collect()
            })
            .collect(),
    ));
    update
}

#[derive(Default)]
struct ScriptState {
    /// Persistent scripts, replayed on every delivery of their key.
    replies: HashMap<String, Vec<InboundUpdate>>,
    /// One-shot scripts, consumed before the persistent ones.
    once: HashMap<String, VecDeque<Vec<InboundUpdate>>>,
    failures: HashMap<String, VecDeque<TransportError>>,
    active: HashMap<SubscriptionId, mpsc::Sender<InboundUpdate>>,
    sent: Vec<String>,
    subscribe_count: usize,
    next_message_id: i64,
}

/// Transport double driven by a stimulus→replies script.
///
/// Every delivered update gets a fresh message reference, mimicking a
/// provider where message ids differ between independent traversals of the
/// same logical branch. Scripted sequence keys are kept verbatim.
pub struct ScriptedTransport {
    state: Mutex<ScriptState>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptState {
                next_message_id: 1000,
                ..Default::default()
            }),
        }
    }

    /// Script the reply batch for a plain text stimulus.
    pub fn on_text(&self, stimulus: &str, replies: Vec<InboundUpdate>) {
        self.state
            .lock()
            .unwrap()
            .replies
            .insert(stimulus.to_string(), replies);
    }

    /// Script a one-shot reply batch for a plain text stimulus, consumed
    /// before any persistent script for the same stimulus.
    pub fn on_text_once(&self, stimulus: &str, replies: Vec<InboundUpdate>) {
        self.state
            .lock()
            .unwrap()
            .once
            .entry(stimulus.to_string())
            .or_default()
            .push_back(replies);
    }

    /// Script the reply batch for an inline-button callback.
    pub fn on_callback(&self, data: &str, replies: Vec<InboundUpdate>) {
        self.on_text(&format!("callback:{data}"), replies);
    }

    /// Queue a one-shot failure for a stimulus key (`"callback:<data>"` for
    /// inline buttons).
    pub fn fail_once(&self, stimulus: &str, error: TransportError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(stimulus.to_string())
            .or_default()
            .push_back(error);
    }

    /// Stimulus keys in send order, failed attempts included.
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.state.lock().unwrap().active.len()
    }

    pub fn subscribe_count(&self) -> usize {
        self.state.lock().unwrap().subscribe_count
    }

    fn dispatch(&self, key: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.sent.push(key.to_string());

        if let Some(queued) = state.failures.get_mut(key) {
            if let Some(error) = queued.pop_front() {
                return Err(error);
            }
        }

        let one_shot = state.once.get_mut(key).and_then(|queued| queued.pop_front());
        let batch = match one_shot {
            Some(batch) => batch,
            None => state.replies.get(key).cloned().unwrap_or_default(),
        };

        let mut outgoing = Vec::with_capacity(batch.len());
        for template in batch {
            state.next_message_id += 1;
            outgoing.push(InboundUpdate {
                message: MessageRef(state.next_message_id),
                ..template
            });
        }
        let senders: Vec<mpsc::Sender<InboundUpdate>> = state.active.values().cloned().collect();
        drop(state);

        for update in outgoing {
            for sender in &senders {
                let _ = sender.try_send(update.clone());
            }
        }
        Ok(())
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_text(&self, _target: &TargetId, text: &str) -> Result<(), TransportError> {
        self.dispatch(text)
    }

    async fn ack_interactive(
        &self,
        _target: &TargetId,
        _message: &MessageRef,
        payload: &ButtonPayload,
    ) -> Result<(), TransportError> {
        let data = payload
            .callback_data
            .clone()
            .or_else(|| payload.url.clone())
            .unwrap_or_default();
        self.dispatch(&format!("callback:{data}"))
    }

    async fn subscribe(&self, _filter: UpdateFilter) -> Result<Subscription, TransportError> {
        let (sender, receiver) = mpsc::channel(64);
        let id = uuid::Uuid::new_v4();
        let mut state = self.state.lock().unwrap();
        state.active.insert(id, sender);
        state.subscribe_count += 1;
        Ok(Subscription {
            id,
            updates: receiver,
        })
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        self.state.lock().unwrap().active.remove(&id);
    }
}

/// Oracle double: declines by default, proposes scripted replies keyed by
/// the bot text of the turn under evaluation. Consulted transcripts are
/// recorded for assertions.
pub struct ScriptedOracle {
    proposals: Mutex<HashMap<String, ReplyProposal>>,
    transcripts: Mutex<Vec<Vec<TranscriptTurn>>>,
}

impl ScriptedOracle {
    pub fn declining() -> Self {
        Self {
            proposals: Mutex::new(HashMap::new()),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    /// Propose `reply` whenever the evaluated turn's bot text is `bot_text`.
    pub fn propose_for(&self, bot_text: &str, reply: &str) {
        self.proposals.lock().unwrap().insert(
            bot_text.to_string(),
            ReplyProposal {
                expected: true,
                text: reply.to_string(),
            },
        );
    }

    pub fn transcripts(&self) -> Vec<Vec<TranscriptTurn>> {
        self.transcripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextOracle for ScriptedOracle {
    async fn propose_reply(
        &self,
        transcript: &[TranscriptTurn],
    ) -> Result<ReplyProposal, OracleError> {
        self.transcripts.lock().unwrap().push(transcript.to_vec());
        let evaluated = transcript
            .last()
            .map(|turn| turn.bot_text.clone())
            .unwrap_or_default();
        Ok(self
            .proposals
            .lock()
            .unwrap()
            .get(&evaluated)
            .cloned()
            .unwrap_or(ReplyProposal {
                expected: false,
                text: String::new(),
            }))
    }
}

/// Media fetcher with no backend; every fetch fails.
pub struct NullMediaFetcher;

#[async_trait]
impl MediaFetcher for NullMediaFetcher {
    async fn fetch(&self, media: &MediaRef) -> Result<MediaHandle, MediaError> {
        Err(MediaError(format!("no media backend for {media}")))
    }
}

/// Media fetcher resolving every reference under a fixed prefix.
pub struct StaticMediaFetcher {
    prefix: String,
}

impl StaticMediaFetcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl MediaFetcher for StaticMediaFetcher {
    async fn fetch(&self, media: &MediaRef) -> Result<MediaHandle, MediaError> {
        Ok(MediaHandle(format!("{}/{}", self.prefix, media.0)))
    }
}

/// Snapshot sink retaining every exported view.
#[derive(Default)]
pub struct CollectingSink {
    views: Mutex<Vec<Vec<SnapshotRow>>>,
}

impl CollectingSink {
    pub fn views(&self) -> usize {
        self.views.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Vec<SnapshotRow>> {
        self.views.lock().unwrap().last().cloned()
    }
}

impl SnapshotSink for CollectingSink {
    fn snapshot(&self, rows: &[SnapshotRow]) {
        self.views.lock().unwrap().push(rows.to_vec());
    }
}

/// Reset hook counting its invocations.
#[derive(Default)]
pub struct CountingReset {
    count: Mutex<usize>,
}

impl CountingReset {
    pub fn count(&self) -> usize {
        *self.count.lock().unwrap()
    }
}

#[async_trait]
impl ResetHook for CountingReset {
    async fn reset(&self) {
        *self.count.lock().unwrap() += 1;
    }
}
