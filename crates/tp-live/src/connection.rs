//! Live client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tp_core::UserId;

/// A connected client as seen by the broadcaster.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: String,
    /// Identity proven by the transport session, if any.
    authenticated_user: Option<UserId>,
    /// User scope this connection has joined.
    joined_user: Mutex<Option<UserId>>,
    /// Send channel to the client's write task.
    tx: mpsc::Sender<Arc<String>>,
    /// Count of messages dropped due to a full or closed channel.
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(
        id: impl Into<String>,
        authenticated_user: Option<UserId>,
        tx: mpsc::Sender<Arc<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            authenticated_user,
            joined_user: Mutex::new(None),
            tx,
            dropped_messages: AtomicU64::new(0),
        }
    }

    pub const fn authenticated_user(&self) -> Option<&UserId> {
        self.authenticated_user.as_ref()
    }

    /// The user scope currently joined.
    pub fn joined_user(&self) -> Option<UserId> {
        self.joined_user.lock().clone()
    }

    pub(crate) fn is_joined_as(&self, user_id: &UserId) -> bool {
        self.joined_user.lock().as_ref() == Some(user_id)
    }

    pub(crate) fn bind(&self, user_id: UserId) {
        *self.joined_user.lock() = Some(user_id);
    }

    pub(crate) fn unbind(&self) {
        *self.joined_user.lock() = None;
    }

    /// Send a text frame to the client without waiting.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }
}
