//! Wire transport boundary. Concrete implementations live with hosts.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::action::{ButtonPayload, MessageRef};
use crate::error::TransportError;
use crate::update::{InboundUpdate, TargetId};

/// Correlation id of a scoped subscription.
pub type SubscriptionId = uuid::Uuid;

/// Restricts which inbound updates a subscription receives.
#[derive(Debug, Clone)]
pub struct UpdateFilter {
    pub target: TargetId,
}

/// A live, correlation-filtered update channel.
///
/// The engine drains `updates` and releases the subscription via
/// `Transport::unsubscribe` on every exit path; updates buffered in the
/// channel remain readable after release.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub updates: mpsc::Receiver<InboundUpdate>,
}

/// Transport to the target bot.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a plain text stimulus.
    async fn send_text(&self, target: &TargetId, text: &str) -> Result<(), TransportError>;

    /// Re-trigger an interactive control on a previously received message.
    /// Button-kind specifics (callback vs url vs login) are the transport's
    /// concern; the full payload is passed through.
    async fn ack_interactive(
        &self,
        target: &TargetId,
        message: &MessageRef,
        payload: &ButtonPayload,
    ) -> Result<(), TransportError>;

    /// Open a scoped update channel for the filtered target.
    async fn subscribe(&self, filter: UpdateFilter) -> Result<Subscription, TransportError>;

    /// Release a subscription. Idempotent.
    async fn unsubscribe(&self, id: SubscriptionId);
}
