// ── Snapshot subscriptions ──
//
// Subscription handle for consumers that react to each publish.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::Published;

/// A subscription to the coordinator's published views.
///
/// Provides point-in-time access plus change notification via
/// [`changed()`](Self::changed) or by converting into a `Stream`.
pub struct SnapshotStream {
    current: Arc<Published>,
    receiver: watch::Receiver<Arc<Published>>,
}

impl SnapshotStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<Published>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The view captured at creation time or at the last `changed()`.
    pub fn current(&self) -> &Arc<Published> {
        &self.current
    }

    /// The latest view, which may be newer than `current()`.
    pub fn latest(&self) -> Arc<Published> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publish. Returns `None` once the coordinator is gone.
    pub async fn changed(&mut self) -> Option<Arc<Published>> {
        self.receiver.changed().await.ok()?;
        let published = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&published);
        Some(published)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    ///
    /// The stream yields the current view first, then every later publish.
    pub fn into_stream(self) -> PublishedStream {
        PublishedStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct PublishedStream {
    inner: WatchStream<Arc<Published>>,
}

impl Stream for PublishedStream {
    type Item = Arc<Published>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
