// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
//! Typed publish-subscribe event streams.
//!
//! An [`EventStream`] fans messages out to any number of subscribers. Each
//! subscriber holds a scoped [`StreamSub`] handle backed by its own unbounded
//! queue: delivery is in publish order per subscriber, and dropping the
//! handle unregisters it — once released, no further delivery is possible.
//!
//! Multiple subscriptions can be merged into a single ordered flow with
//! [`merge`]: per-stream order is preserved, the interleaving across streams
//! is unspecified.

use crate::channel::{mpsc_unbounded, Tx, UnboundedRx, UnboundedTx};
use futures::stream::{select_all, SelectAll, Stream};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    task::{Context, Poll},
};

/// What happened to the item carried by a [`StreamEvent`].
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StreamAction {
    Create,
    Update,
    Delete,
}

/// Message shape carried by every [`EventStream`]:
/// `{action: "create"|"update"|"delete", next, previous?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent<T> {
    pub action: StreamAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<T>,
    pub next: T,
}

impl<T> StreamEvent<T> {
    pub fn create(next: T) -> Self {
        Self {
            action: StreamAction::Create,
            previous: None,
            next,
        }
    }

    pub fn update(previous: T, next: T) -> Self {
        Self {
            action: StreamAction::Update,
            previous: Some(previous),
            next,
        }
    }

    pub fn delete(next: T) -> Self {
        Self {
            action: StreamAction::Delete,
            previous: None,
            next,
        }
    }
}

struct Subscriber<T> {
    id: u64,
    tx: UnboundedTx<StreamEvent<T>>,
}

struct Shared<T> {
    subscribers: Mutex<Vec<Subscriber<T>>>,
    next_id: AtomicU64,
}

/// Multi-subscriber publish-subscribe stream of [`StreamEvent`]s.
///
/// Cloning shares the underlying subscriber registry, so any clone may
/// publish and any clone may be subscribed to.
pub struct EventStream<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Default for EventStream<T> {
    fn default() -> Self {
        Self {
            shared: Arc::new(Shared {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }
}

impl<T> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<T> EventStream<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }

    /// Register a new subscriber and return its scoped handle.
    pub fn subscribe(&self) -> StreamSub<T> {
        let (tx, rx) = mpsc_unbounded();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared.subscribers.lock().push(Subscriber { id, tx });
        StreamSub {
            id,
            shared: Arc::downgrade(&self.shared),
            rx,
        }
    }
}

impl<T: Clone> EventStream<T> {
    /// Deliver `event` to every live subscriber, in registration order.
    ///
    /// Subscribers whose handle has gone away are pruned.
    pub fn publish(&self, event: StreamEvent<T>) {
        self.shared
            .subscribers
            .lock()
            .retain(|subscriber| subscriber.tx.send(event.clone()).is_ok());
    }
}

/// Scoped subscription handle yielding [`StreamEvent`]s in publish order.
///
/// Dropping the handle unregisters the subscriber; no event published after
/// release can be delivered.
pub struct StreamSub<T> {
    id: u64,
    shared: Weak<Shared<T>>,
    rx: UnboundedRx<StreamEvent<T>>,
}

impl<T> fmt::Debug for StreamSub<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSub").field("id", &self.id).finish()
    }
}

impl<T> StreamSub<T> {
    pub async fn recv(&mut self) -> Option<StreamEvent<T>> {
        self.rx.recv().await
    }
}

impl<T> Stream for StreamSub<T> {
    type Item = StreamEvent<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.rx.poll_recv(cx)
    }
}

impl<T> Drop for StreamSub<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared
                .subscribers
                .lock()
                .retain(|subscriber| subscriber.id != self.id);
        }
    }
}

/// Merge several subscriptions into a single flow.
///
/// Per-stream order is preserved; the interleaving across streams is
/// whatever readiness dictates.
pub fn merge<T, I>(subs: I) -> SelectAll<StreamSub<T>>
where
    I: IntoIterator<Item = StreamSub<T>>,
{
    select_all(subs)
}
