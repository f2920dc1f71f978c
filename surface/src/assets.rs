//! Surface Asset Store
//!
//! Sprites and icons arrive over the session socket as data URIs, possibly
//! after the config that references them. Consumers wait for an asset by
//! name; delivery wakes every waiter. Assets are kept for the lifetime of the
//! session, matching the host's per-session dedup: a name is streamed at most
//! once, so evicting it here would lose it for good.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

struct Inner {
    values: HashMap<String, Arc<str>>,
    waiters: HashMap<String, Vec<oneshot::Sender<Arc<str>>>>,
}

/// Session-scoped store of delivered assets.
#[derive(Clone)]
pub struct AssetStore {
    inner: Arc<Mutex<Inner>>,
}

impl Default for AssetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                values: HashMap::new(),
                waiters: HashMap::new(),
            })),
        }
    }

    /// Store a delivered asset and wake everyone waiting on it.
    pub fn insert(&self, name: String, content: String) {
        let content: Arc<str> = content.into();
        let woken = {
            let mut inner = self.inner.lock();
            inner.values.insert(name.clone(), Arc::clone(&content));
            inner.waiters.remove(&name)
        };
        if let Some(waiters) = woken {
            for tx in waiters {
                tx.send(Arc::clone(&content)).ok();
            }
        }
    }

    /// The asset if it has already been delivered.
    #[must_use]
    pub fn try_get(&self, name: &str) -> Option<Arc<str>> {
        self.inner.lock().values.get(name).cloned()
    }

    /// Wait until the named asset is delivered.
    pub async fn wait_for(&self, name: &str) -> Arc<str> {
        let rx = {
            let mut inner = self.inner.lock();
            if let Some(content) = inner.values.get(name) {
                return Arc::clone(content);
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.entry(name.to_string()).or_default().push(tx);
            rx
        };
        match rx.await {
            Ok(content) => content,
            // Store dropped mid-session; this task is being torn down too.
            Err(_) => std::future::pending().await,
        }
    }

    /// Number of delivered assets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    /// Whether nothing has been delivered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_after_insert() {
        let store = AssetStore::new();
        store.insert("pets/cat/tabby/idle.gif".into(), "data:image/gif;base64,AA".into());
        assert_eq!(
            store.try_get("pets/cat/tabby/idle.gif").as_deref(),
            Some("data:image/gif;base64,AA")
        );
        assert!(store.try_get("pets/cat/tabby/walk.gif").is_none());
    }

    #[tokio::test]
    async fn test_wait_resolves_on_delivery() {
        let store = AssetStore::new();
        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.wait_for("icons/hover").await })
        };
        tokio::task::yield_now().await;
        store.insert("icons/hover".into(), "data:image/png;base64,BB".into());

        let content = tokio::time::timeout(Duration::from_millis(100), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&*content, "data:image/png;base64,BB");
    }

    #[tokio::test]
    async fn test_wait_immediate_when_present() {
        let store = AssetStore::new();
        store.insert("icons/hover".into(), "x".into());
        let content = tokio::time::timeout(Duration::from_millis(10), store.wait_for("icons/hover"))
            .await
            .unwrap();
        assert_eq!(&*content, "x");
    }

    #[tokio::test]
    async fn test_all_waiters_woken() {
        let store = AssetStore::new();
        let a = {
            let store = store.clone();
            tokio::spawn(async move { store.wait_for("pets/a.gif").await })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move { store.wait_for("pets/a.gif").await })
        };
        tokio::task::yield_now().await;
        store.insert("pets/a.gif".into(), "y".into());
        assert_eq!(&*a.await.unwrap(), "y");
        assert_eq!(&*b.await.unwrap(), "y");
    }
}
