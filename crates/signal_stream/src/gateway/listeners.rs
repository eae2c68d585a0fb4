use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::error;

pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered list of frame callbacks. Every registered listener sees every frame,
/// in registration order.
#[derive(Default)]
pub struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Listener)>>,
}

impl Listeners {
    pub fn register(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dispatch(&self, frame: &Value) {
        // Callbacks run outside the lock so they may register or remove listeners.
        let listeners: Vec<Listener> = self.lock().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            // A panicking callback must not take the connection task down with it.
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(frame))) {
                error!("Frame listener panicked: {}", panic_message(payload.as_ref()));
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder(tag: &'static str, seen: &Arc<Mutex<Vec<String>>>) -> Listener {
        let seen = seen.clone();
        Arc::new(move |frame: &Value| {
            seen.lock().unwrap().push(format!("{}:{}", tag, frame["n"]));
        })
    }

    #[test]
    fn test_every_listener_sees_every_frame_in_order() {
        let listeners = Listeners::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        listeners.register(recorder("feed", &seen));
        listeners.register(recorder("logs", &seen));

        listeners.dispatch(&json!({ "n": 1 }));
        listeners.dispatch(&json!({ "n": 2 }));

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["feed:1", "logs:1", "feed:2", "logs:2"]
        );
    }

    #[test]
    fn test_removed_listener_stops_receiving() {
        let listeners = Listeners::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let feed = listeners.register(recorder("feed", &seen));
        listeners.register(recorder("logs", &seen));

        assert!(listeners.remove(feed));
        assert!(!listeners.remove(feed));
        listeners.dispatch(&json!({ "n": 3 }));

        assert_eq!(*seen.lock().unwrap(), vec!["logs:3"]);
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_dispatch() {
        let listeners = Listeners::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        listeners.register(Arc::new(|frame: &Value| {
            if frame["n"] == 1 {
                panic!("bad frame");
            }
        }));
        listeners.register(recorder("logs", &seen));

        listeners.dispatch(&json!({ "n": 1 }));
        listeners.dispatch(&json!({ "n": 2 }));

        assert_eq!(*seen.lock().unwrap(), vec!["logs:1", "logs:2"]);
        assert_eq!(listeners.len(), 2);
    }
}
