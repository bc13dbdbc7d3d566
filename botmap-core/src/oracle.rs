//! Free-text reply oracle boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;

/// One turn of the conversation transcript handed to the oracle: the user
/// stimulus that led to the bot message, the message itself, and the actions
/// available afterwards. Action fields are display summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub action_in: Option<String>,
    pub bot_text: String,
    pub actions_out: Vec<String>,
}

/// Oracle verdict: whether the bot expects free text, and a plausible reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyProposal {
    pub expected: bool,
    pub text: String,
}

/// External capability producing a plausible free-text user reply for the
/// given transcript. The last turn is the one under evaluation.
#[async_trait]
pub trait TextOracle: Send + Sync {
    async fn propose_reply(
        &self,
        transcript: &[TranscriptTurn],
    ) -> Result<ReplyProposal, OracleError>;
}
