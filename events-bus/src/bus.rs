use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::{join_all, FutureExt};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::handlers::{EventPayload, Listener};

type ListenerMap = HashMap<String, HashMap<Uuid, Listener>>;

/// Outcome of a single [`EventBus::emit`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    /// Listeners that were called
    pub invoked: usize,
    /// Listeners that returned an error or panicked
    pub failed: usize,
}

impl EmitReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// In-process publish/subscribe hub
///
/// Persistent and one-shot listeners live in separate maps keyed by event
/// name. A listener is identified by its [`Listener::id`], so registering the
/// same handle twice for one event keeps a single registration.
///
/// Locks are never held while listeners run; a listener may freely register
/// or remove other listeners.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<ListenerMap>,
    once_listeners: RwLock<ListenerMap>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a persistent listener. Returns `false` if it was already registered.
    pub fn on(&self, event: impl Into<String>, listener: &Listener) -> bool {
        let event = event.into();
        debug!(event = %event, listener = %listener.id(), "Registering listener");
        self.listeners
            .write()
            .entry(event)
            .or_default()
            .insert(listener.id(), listener.clone())
            .is_none()
    }

    /// Register a listener that fires on the next emit of `event` only
    pub fn once(&self, event: impl Into<String>, listener: &Listener) -> bool {
        let event = event.into();
        debug!(event = %event, listener = %listener.id(), "Registering one-shot listener");
        self.once_listeners
            .write()
            .entry(event)
            .or_default()
            .insert(listener.id(), listener.clone())
            .is_none()
    }

    /// Remove a listener from both the persistent and one-shot sets
    pub fn off(&self, event: &str, listener: &Listener) -> bool {
        let removed_persistent = Self::remove_from(&self.listeners, event, listener.id());
        let removed_once = Self::remove_from(&self.once_listeners, event, listener.id());
        removed_persistent || removed_once
    }

    fn remove_from(map: &RwLock<ListenerMap>, event: &str, id: Uuid) -> bool {
        let mut map = map.write();
        let Some(registered) = map.get_mut(event) else {
            return false;
        };
        let removed = registered.remove(&id).is_some();
        if registered.is_empty() {
            map.remove(event);
        }
        removed
    }

    /// Invoke every listener registered for `event` and wait for all of them
    ///
    /// One-shot listeners are detached before any listener runs, so a second
    /// concurrent emit can never fire them again. Listener failures and panics
    /// are logged and counted; they never stop sibling listeners.
    pub async fn emit(&self, event: &str, payload: EventPayload) -> EmitReport {
        let mut pending: Vec<Listener> = self
            .listeners
            .read()
            .get(event)
            .map(|registered| registered.values().cloned().collect())
            .unwrap_or_default();
        let once = self.once_listeners.write().remove(event);
        if let Some(once) = once {
            pending.extend(once.into_values());
        }

        if pending.is_empty() {
            debug!(event = %event, "No listeners registered");
            return EmitReport::default();
        }

        let invocations = pending.iter().map(|listener| {
            AssertUnwindSafe(listener.invoke(payload.clone())).catch_unwind()
        });
        let outcomes = join_all(invocations).await;

        let mut report = EmitReport {
            invoked: outcomes.len(),
            failed: 0,
        };
        for (listener, outcome) in pending.iter().zip(outcomes) {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(event = %event, listener = %listener.id(), error = %e, "Event listener failed");
                }
                Err(_) => {
                    report.failed += 1;
                    error!(event = %event, listener = %listener.id(), "Event listener panicked");
                }
            }
        }

        debug!(event = %event, invoked = report.invoked, failed = report.failed, "Event emitted");
        report
    }

    /// Serialize `payload` and emit it
    pub async fn emit_serialized<T: Serialize>(&self, event: &str, payload: &T) -> Result<EmitReport> {
        let payload = serde_json::to_value(payload)?;
        Ok(self.emit(event, payload).await)
    }

    /// Run `work`, publish the payload derived from its output, then return the output
    ///
    /// `to_payload` returning `None` skips the publish, which lets callers
    /// announce only successful results.
    pub async fn emit_after<T, Fut, F>(&self, event: &str, work: Fut, to_payload: F) -> T
    where
        Fut: Future<Output = T>,
        F: FnOnce(&T) -> Option<Value>,
    {
        let output = work.await;
        if let Some(payload) = to_payload(&output) {
            self.emit(event, payload).await;
        }
        output
    }

    /// Event names with at least one persistent or one-shot listener
    pub fn list_events(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self.listeners.read().keys().cloned().collect();
        names.extend(self.once_listeners.read().keys().cloned());
        names.into_iter().collect()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        let persistent = self.listeners.read().get(event).map_or(0, HashMap::len);
        let once = self.once_listeners.read().get(event).map_or(0, HashMap::len);
        persistent + once
    }

    /// Remove every listener for every event
    pub fn clear(&self) {
        self.listeners.write().clear();
        self.once_listeners.write().clear();
    }

    /// Remove every listener for `event`
    pub fn clear_event(&self, event: &str) {
        self.listeners.write().remove(event);
        self.once_listeners.write().remove(event);
    }
}
