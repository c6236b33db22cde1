//! Session-end notification
//!
//! The client never navigates or clears application state itself. When a
//! session cannot be recovered it signals a [`SessionEnd`] and the
//! application decides what to do (redirect to the root page, show a login
//! prompt, and so on).

use std::sync::{Arc, PoisonError, RwLock};

/// Why the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The refresh call after a 401 failed
    RefreshFailed,
    /// The refresh succeeded but the retried call was still rejected with 401
    RetryRejected,
    /// A call returned 403 and the session was logged out
    Forbidden,
}

/// Receives session-end signals
pub trait UnauthorizedHandler: Send + Sync {
    fn on_session_end(&self, reason: SessionEnd);
}

impl<F> UnauthorizedHandler for F
where
    F: Fn(SessionEnd) + Send + Sync,
{
    fn on_session_end(&self, reason: SessionEnd) {
        self(reason);
    }
}

/// Handle returned by [`SessionEvents::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    primary: Option<Arc<dyn UnauthorizedHandler>>,
    listeners: Vec<(ListenerId, Arc<dyn UnauthorizedHandler>)>,
    next_id: u64,
}

/// Handler registry owned by one client
///
/// Holds a single replaceable primary handler plus any number of listeners.
#[derive(Default)]
pub struct SessionEvents {
    registry: RwLock<Registry>,
}

impl SessionEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the primary handler
    pub fn set_handler(&self, handler: Option<Arc<dyn UnauthorizedHandler>>) {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .primary = handler;
    }

    /// Registers an additional listener
    pub fn subscribe(&self, handler: Arc<dyn UnauthorizedHandler>) -> ListenerId {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.push((id, handler));
        id
    }

    /// Removes a listener; returns false if it was not registered
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let before = registry.listeners.len();
        registry.listeners.retain(|(existing, _)| *existing != id);
        registry.listeners.len() != before
    }

    /// Signals every handler, primary first, then listeners in registration order
    pub fn notify(&self, reason: SessionEnd) {
        let handlers: Vec<Arc<dyn UnauthorizedHandler>> = {
            let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
            registry
                .primary
                .iter()
                .cloned()
                .chain(registry.listeners.iter().map(|(_, h)| h.clone()))
                .collect()
        };

        tracing::info!(?reason, handlers = handlers.len(), "Session ended");

        for handler in handlers {
            handler.on_session_end(reason);
        }
    }
}

impl std::fmt::Debug for SessionEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("SessionEvents")
            .field("has_handler", &registry.primary.is_some())
            .field("listeners", &registry.listeners.len())
            .finish()
    }
}
