// ── Snapshot store ──
//
// Holds the currently published snapshot and fans out publish
// notifications. Reads are lock-free loads of an `Arc`; a publish is a
// single pointer swap, so readers see either the old view or the new
// one, never a mix.

pub(crate) mod refresh;

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;

use crate::model::{Published, Snapshot};
use crate::stream::SnapshotStream;

pub struct SnapshotStore {
    current: ArcSwap<Published>,
    notify: watch::Sender<Arc<Published>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let initial = Arc::new(Published::default());
        let (notify, _) = watch::channel(Arc::clone(&initial));
        Self {
            current: ArcSwap::new(initial),
            notify,
        }
    }

    /// The last published view: snapshot plus status.
    pub fn current(&self) -> Arc<Published> {
        self.current.load_full()
    }

    /// Shortcut for the snapshot half of [`current`](Self::current).
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.load().snapshot)
    }

    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.notify.subscribe())
    }

    /// Swap in a new view and wake subscribers.
    pub(crate) fn publish(&self, published: Published) {
        let published = Arc::new(published);
        self.current.store(Arc::clone(&published));
        self.notify.send_replace(published);
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
