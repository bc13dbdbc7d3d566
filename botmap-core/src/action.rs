//! Outbound stimuli: the tagged `Action` variant and its value-equality contract.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Provider-assigned reference to a received message.
///
/// Needed to re-trigger interactive controls, but not stable across
/// independent traversals of the same logical branch — two runs that reach
/// "the same" state observe different references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef(pub i64);

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Button-specific fields required to re-trigger one inline control.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonPayload {
    #[serde(default)]
    pub callback_data: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub switch_inline_query: Option<String>,
    #[serde(default)]
    pub web_app_url: Option<String>,
    #[serde(default)]
    pub login_url: Option<String>,
}

/// Discriminant of an outbound stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SendText,
    SendRandomText,
    SendAiText,
    PushInlineButton,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::SendText => "send_text",
            ActionKind::SendRandomText => "send_random_text",
            ActionKind::SendAiText => "send_ai_text",
            ActionKind::PushInlineButton => "push_inline_button",
        };
        f.write_str(name)
    }
}

/// One outbound stimulus to the target bot.
///
/// Equality and hash cover `(kind, text)` only: transient provider
/// identifiers (the message reference of an inline button) are excluded so
/// that states replayed in a later traversal compare equal to their recorded
/// counterparts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Plain text, including commands and reply-keyboard button presses.
    SendText { text: String },
    /// Fixed junk text used to probe how the bot handles unexpected input.
    SendRandomText { text: String },
    /// A plausible free-text user reply produced by the text oracle.
    SendAiText { text: String },
    /// Re-trigger of a specific inline control on a received message.
    PushInlineButton {
        text: String,
        message: MessageRef,
        payload: ButtonPayload,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::SendText { .. } => ActionKind::SendText,
            Action::SendRandomText { .. } => ActionKind::SendRandomText,
            Action::SendAiText { .. } => ActionKind::SendAiText,
            Action::PushInlineButton { .. } => ActionKind::PushInlineButton,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Action::SendText { text }
            | Action::SendRandomText { text }
            | Action::SendAiText { text }
            | Action::PushInlineButton { text, .. } => text,
        }
    }

    /// AI-generated stimuli differ every run and are excluded from node
    /// equality and from restore reconciliation.
    pub fn is_ai(&self) -> bool {
        matches!(self, Action::SendAiText { .. })
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.text() == other.text()
    }
}

impl Eq for Action {}

impl Hash for Action {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        self.text().hash(state);
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.text())
    }
}
