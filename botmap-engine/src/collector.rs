//! Sends one stimulus under a scoped subscription and turns the buffered
//! inbound updates into chained state nodes.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout, Instant};
use tracing::debug;

use botmap_core::action::Action;
use botmap_core::error::{ExploreError, TransportError};
use botmap_core::state::{NodeId, StateStore};
use botmap_core::transport::{Subscription, Transport, UpdateFilter};
use botmap_core::update::{InboundUpdate, Response, TargetId};

use crate::discover::NodeFactory;
use crate::rate::RateController;

pub struct ResponseCollector {
    transport: Arc<dyn Transport>,
    target: TargetId,
    response_timeout: Duration,
}

impl ResponseCollector {
    pub fn new(transport: Arc<dyn Transport>, target: TargetId, response_timeout: Duration) -> Self {
        Self {
            transport,
            target,
            response_timeout,
        }
    }

    /// Perform one stimulus against the live conversation positioned at
    /// `cursor` and return the chain of newly created nodes, oldest first.
    ///
    /// The subscription is released on every exit path before the outcome is
    /// propagated, and the per-action floor is always waited out on the
    /// response path, so a new stimulus can never overlap a prior response
    /// window. Zero buffered updates finalize as a single synthetic timeout
    /// marker; several chain parent→child with only the first node carrying
    /// `action_in`.
    pub async fn perform(
        &self,
        store: &mut StateStore,
        rate: &mut RateController,
        factory: &NodeFactory,
        cursor: NodeId,
        action: &Action,
        replay: bool,
    ) -> Result<Vec<NodeId>, ExploreError> {
        debug!(%action, replay, "performing stimulus");
        let started = Instant::now();

        let mut subscription = self
            .transport
            .subscribe(UpdateFilter {
                target: self.target.clone(),
            })
            .await?;
        rate.register_request();

        let outcome = self
            .drive(&mut subscription, store, rate, action, started)
            .await;

        // The window must close on every exit path, before the outcome is
        // even inspected.
        self.transport.unsubscribe(subscription.id).await;

        let mut updates = outcome?;
        while let Ok(update) = subscription.updates.try_recv() {
            updates.push(update);
        }

        // Provider order, not arrival order. Updates lacking a sequence sort
        // first; the sort is stable.
        updates.sort_by_key(|update| update.sequence.unwrap_or(i64::MIN));

        let responses: Vec<Response> = if updates.is_empty() {
            debug!(%action, "no inbound update before timeout, synthesizing marker");
            vec![Response::Timeout]
        } else {
            updates.into_iter().map(Response::Update).collect()
        };

        let mut produced = Vec::with_capacity(responses.len());
        let mut parent = cursor;
        for (i, response) in responses.iter().enumerate() {
            let action_in = if i == 0 { Some(action.clone()) } else { None };
            let id = factory
                .node_from_response(store, parent, action_in, response, replay)
                .await?;
            produced.push(id);
            parent = id;
        }
        debug!(states = produced.len(), "stimulus finalized");
        Ok(produced)
    }

    /// Send the stimulus — retrying the same one unconditionally after every
    /// provider backoff — then wait up to the response timeout for the first
    /// matching update and hold the per-action floor. Updates arriving during
    /// the floor stay buffered in the channel and are drained by the caller.
    async fn drive(
        &self,
        subscription: &mut Subscription,
        store: &StateStore,
        rate: &mut RateController,
        action: &Action,
        started: Instant,
    ) -> Result<Vec<InboundUpdate>, ExploreError> {
        loop {
            let sent = match action {
                Action::PushInlineButton {
                    message, payload, ..
                } => {
                    self.transport
                        .ack_interactive(&self.target, message, payload)
                        .await
                }
                other => self.transport.send_text(&self.target, other.text()).await,
            };
            match sent {
                Ok(()) => break,
                Err(TransportError::RateLimited { retry_after }) => {
                    rate.handle_backoff(retry_after, &store.flatten()).await;
                }
                Err(err) => return Err(err.into()),
            }
        }

        let mut updates = Vec::new();
        match timeout(self.response_timeout, subscription.updates.recv()).await {
            Ok(Some(update)) => updates.push(update),
            // Channel closed: the transport went away; finalize whatever
            // already arrived.
            Ok(None) => {}
            // No update inside the window.
            Err(_) => {}
        }

        rate.ensure_minimum_wait(started).await;
        Ok(updates)
    }
}
