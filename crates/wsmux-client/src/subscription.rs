use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;

use crate::client::Shared;
use crate::error::Result;
use crate::payload::TopicEvent;
use crate::topic::Topic;
use crate::SubscriptionId;

/// Caller's handle on one logical subscription.
///
/// Yields typed push events in arrival order. The stream survives
/// reconnects: while the link is down it simply stays pending, and resumes
/// once the subscription has been replayed on the new link. It ends after
/// [`unsubscribe`](Subscription::unsubscribe), after the client is closed,
/// or after an `Err` item reporting a failed replay.
///
/// Dropping the handle unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    rx: mpsc::UnboundedReceiver<Result<TopicEvent>>,
    interrupted: Arc<AtomicBool>,
    shared: Weak<Shared>,
    detached: bool,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        topic: Topic,
        rx: mpsc::UnboundedReceiver<Result<TopicEvent>>,
        interrupted: Arc<AtomicBool>,
        shared: Weak<Shared>,
    ) -> Self {
        Self {
            id,
            topic,
            rx,
            interrupted,
            shared,
            detached: false,
        }
    }

    /// Client-local identity of this subscription. Stable across reconnects.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// True while the link is down and the subscription awaits replay.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    /// Wait for the next event. `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<Result<TopicEvent>> {
        self.rx.recv().await
    }

    /// Stop delivery of further pushes and forget the subscription.
    ///
    /// Events queued before this call can still be read. The server is not
    /// notified. Idempotent.
    pub fn unsubscribe(&mut self) {
        if self.detached {
            return;
        }
        self.detached = true;
        if let Some(shared) = self.shared.upgrade() {
            shared.detach(self.id);
        }
    }
}

impl Stream for Subscription {
    type Item = Result<TopicEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
