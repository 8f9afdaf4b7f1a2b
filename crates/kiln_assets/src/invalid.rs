//! Invalid Asset Registry
//!
//! Process-wide ledger of assets that failed during this run, with the last
//! error recorded for each. Tools read it to present a persistent list of
//! broken shaders independent of the call site that triggered the failure.
//!
//! # Concurrency
//!
//! All mutations and snapshot reads serialize on one mutex. Change callbacks
//! are invoked synchronously on the mutating thread while that mutex is held,
//! in registration order.
//!
//! **Callbacks must not call back into the registry**; doing so deadlocks.

use parking_lot::Mutex;

/// Identifier returned by [`InvalidAssetRegistry::add_on_change_event`].
pub type ChangeEventId = u32;

/// Change notification callback.
pub type OnChangeEvent = Box<dyn Fn() + Send + Sync>;

/// One failed asset and its most recent error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidAssetRecord {
    pub name: String,
    pub error_string: String,
}

struct RegistryInner {
    // Insertion ordered, names unique.
    assets: Vec<InvalidAssetRecord>,
    listeners: Vec<(ChangeEventId, OnChangeEvent)>,
    next_event_id: ChangeEventId,
}

impl RegistryInner {
    fn new() -> Self {
        Self {
            assets: Vec::new(),
            listeners: Vec::new(),
            next_event_id: 1,
        }
    }

    fn notify(&self) {
        for (_, callback) in &self.listeners {
            callback();
        }
    }
}

/// Thread-safe record of invalid assets.
///
/// An inactive registry ignores every `mark_*` call, which makes the
/// bookkeeping free for shipping builds.
pub struct InvalidAssetRegistry {
    active: bool,
    inner: Mutex<RegistryInner>,
}

impl Default for InvalidAssetRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}

impl std::fmt::Debug for InvalidAssetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("InvalidAssetRegistry")
            .field("active", &self.active)
            .field("assets", &inner.assets)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

impl InvalidAssetRegistry {
    #[must_use]
    pub fn new(active: bool) -> Self {
        Self {
            active,
            inner: Mutex::new(RegistryInner::new()),
        }
    }

    #[must_use]
    pub fn inactive() -> Self {
        Self::new(false)
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Records `name` as invalid, or replaces its error text if already present.
    ///
    /// Fires one change notification per call, even when nothing changed.
    /// An empty `error_string` is stored as-is.
    pub fn mark_invalid(&self, name: &str, error_string: &str) {
        if !self.active {
            return;
        }

        let mut inner = self.inner.lock();
        if let Some(record) = inner.assets.iter_mut().find(|r| r.name == name) {
            record.error_string = error_string.to_string();
        } else {
            inner.assets.push(InvalidAssetRecord {
                name: name.to_string(),
                error_string: error_string.to_string(),
            });
        }
        log::warn!("Invalid asset `{name}`: {error_string}");
        inner.notify();
    }

    /// Removes `name` if present. Absent names are a silent no-op.
    pub fn mark_valid(&self, name: &str) {
        if !self.active {
            return;
        }

        let mut inner = self.inner.lock();
        let Some(index) = inner.assets.iter().position(|r| r.name == name) else {
            return;
        };
        inner.assets.remove(index);
        log::info!("Asset `{name}` is valid again");
        inner.notify();
    }

    /// Snapshot of the current records in insertion order.
    #[must_use]
    pub fn assets(&self) -> Vec<InvalidAssetRecord> {
        self.inner.lock().assets.clone()
    }

    #[must_use]
    pub fn has_invalid_assets(&self) -> bool {
        !self.inner.lock().assets.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().assets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribes to changes. Callbacks run in registration order.
    pub fn add_on_change_event<F>(&self, callback: F) -> ChangeEventId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = inner.next_event_id;
        inner.next_event_id = inner.next_event_id.wrapping_add(1);
        inner.listeners.push((id, Box::new(callback)));
        id
    }

    /// Unsubscribes. Returns `false` if `id` was not registered.
    pub fn remove_on_change_event(&self, id: ChangeEventId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(event_id, _)| *event_id != id);
        inner.listeners.len() != before
    }
}
