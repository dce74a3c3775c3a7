use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;

/// Payload delivered to listeners
pub type EventPayload = Value;

type Callback = Arc<dyn Fn(EventPayload) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A registered event callback
///
/// Each listener carries a stable id, so the same handle can be passed to
/// [`EventBus::off`](crate::EventBus::off) to remove it. Clones share the id.
#[derive(Clone)]
pub struct Listener {
    id: Uuid,
    callback: Callback,
}

impl Listener {
    /// Listener that may suspend
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            callback: Arc::new(move |payload| callback(payload).boxed()),
        }
    }

    /// Listener that completes synchronously
    pub fn sync<F>(callback: F) -> Self
    where
        F: Fn(EventPayload) -> Result<()> + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        Self {
            id: Uuid::new_v4(),
            callback: Arc::new(move |payload| {
                let callback = Arc::clone(&callback);
                async move { callback(payload) }.boxed()
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    // The callback runs inside the returned future so panics surface when polled
    pub(crate) fn invoke(&self, payload: EventPayload) -> BoxFuture<'static, Result<()>> {
        let callback = Arc::clone(&self.callback);
        async move { callback(payload).await }.boxed()
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}
