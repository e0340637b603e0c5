//! Mutable admin settings with change notification.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, watch};
use tripwire_sdk::AdminSettings;

/// Shared, versioned admin settings.
///
/// Readers take a snapshot; writers replace the whole value and wake
/// watchers. The version counter lets a subscriber tell a replacement
/// apart from a spurious wake.
#[derive(Clone)]
pub struct SettingsStore {
    inner: Arc<Inner>,
}

struct Inner {
    data: RwLock<AdminSettings>,
    version: AtomicU64,
    version_tx: watch::Sender<u64>,
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(AdminSettings::default())
    }
}

impl SettingsStore {
    pub fn new(initial: AdminSettings) -> Self {
        let (version_tx, _) = watch::channel(0u64);
        Self {
            inner: Arc::new(Inner {
                data: RwLock::new(initial),
                version: AtomicU64::new(0),
                version_tx,
            }),
        }
    }

    pub async fn get(&self) -> AdminSettings {
        *self.inner.data.read().await
    }

    /// Replace the settings and notify all watchers.
    pub async fn replace(&self, settings: AdminSettings) {
        let mut guard = self.inner.data.write().await;
        *guard = settings;
        let version = self.inner.version.fetch_add(1, Ordering::Relaxed) + 1;
        drop(guard);
        let _ = self.inner.version_tx.send(version);
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.version_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replace_is_visible_and_notifies() {
        let store = SettingsStore::default();
        assert!(!store.get().await.debug);

        let mut watcher = store.subscribe();
        store.replace(AdminSettings { debug: true }).await;

        assert!(store.get().await.debug);
        watcher.changed().await.unwrap();
        assert_eq!(*watcher.borrow(), 1);
    }
}
