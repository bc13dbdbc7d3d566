//! Wire-facing value types delivered by the transport.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::{ButtonPayload, MessageRef};

/// Identity of the bot under exploration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(pub String);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider handle for a media attachment, resolvable via `MediaFetcher`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef(pub String);

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local artifact produced by a successful media fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaHandle(pub String);

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One button of an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    pub payload: ButtonPayload,
}

/// Keyboard attached to an inbound update.
///
/// Reply and inline keyboards never coexist on one message; the variant
/// records which one was present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Keyboard {
    Reply(Vec<Vec<String>>),
    Inline(Vec<Vec<InlineButton>>),
}

/// One inbound update delivered for the subscribed target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundUpdate {
    pub message: MessageRef,
    /// Provider-assigned ordering key. Updates lacking one sort first.
    pub sequence: Option<i64>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub media: Option<MediaRef>,
    pub keyboard: Option<Keyboard>,
}

impl InboundUpdate {
    /// Free text carried by the update: the text body, or the media caption
    /// when the body is absent or empty.
    pub fn body_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.caption.as_deref().filter(|c| !c.is_empty()))
    }
}

/// Finalized outcome of one stimulus: a real update, or the synthetic marker
/// recorded when nothing arrived inside the response window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Update(InboundUpdate),
    Timeout,
}
