// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.

use derive_more::Constructor;
use futures::Stream;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Transmitter end of a channel, abstracted over the underlying channel kind.
pub trait Tx {
    type Item;

    fn send(&self, item: Self::Item) -> Result<(), TxDropped>;
}

/// Indicates that the receiver side of a communication channel was dropped.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Error)]
#[error("receiver dropped")]
pub struct TxDropped;

impl<T> From<mpsc::error::SendError<T>> for TxDropped {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        Self
    }
}

/// Construct an unbounded channel pair.
pub fn mpsc_unbounded<T>() -> (UnboundedTx<T>, UnboundedRx<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UnboundedTx::new(tx), UnboundedRx::new(rx))
}

/// Transmitter over an unbounded tokio mpsc channel.
#[derive(Debug, Constructor)]
pub struct UnboundedTx<T> {
    pub tx: mpsc::UnboundedSender<T>,
}

impl<T> Tx for UnboundedTx<T> {
    type Item = T;

    fn send(&self, item: Self::Item) -> Result<(), TxDropped> {
        self.tx.send(item).map_err(TxDropped::from)
    }
}

impl<T> Clone for UnboundedTx<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// Receiver over an unbounded tokio mpsc channel.
#[derive(Debug, Constructor)]
pub struct UnboundedRx<T> {
    pub rx: mpsc::UnboundedReceiver<T>,
}

impl<T> UnboundedRx<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Consume `Self`, returning a [`Stream`] of received items.
    pub fn into_stream(self) -> impl Stream<Item = T> {
        UnboundedReceiverStream::new(self.rx)
    }
}
