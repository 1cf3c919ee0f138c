// crates/handle-service-core/src/runtime/store.rs
// ============================================================================
// Module: Handle Service In-Memory Store
// Description: In-memory handle store and shared store wrapper.
// Purpose: Provide a deterministic store for tests, demos, and `type = "memory"`.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryHandleStore`] keeps records in a mutex-protected ordered map and
//! assigns monotonically increasing storage keys, mirroring the SQLite
//! store's row ids. [`SharedHandleStore`] erases the concrete backend so
//! hosts can pick memory or SQLite at startup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::Handle;
use crate::core::HandleField;
use crate::core::HandleId;
use crate::interfaces::HandleStore;
use crate::interfaces::Projection;
use crate::interfaces::StoreError;
use crate::interfaces::StoredHandle;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Mutable state behind the in-memory store lock.
#[derive(Debug, Default)]
struct MemoryState {
    /// Records keyed by handle id.
    records: BTreeMap<HandleId, (i64, Handle)>,
    /// Next storage key to assign.
    next_key: i64,
}

/// In-memory handle store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryHandleStore {
    /// Store state protected by a mutex.
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryHandleStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.records.len())
    }

    /// Returns true when no records are stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.records.is_empty())
    }

    /// Acquires the state lock.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Store("handle store mutex poisoned".to_string()))
    }
}

impl HandleStore for InMemoryHandleStore {
    fn find_by_field(
        &self,
        field: HandleField,
        values: &BTreeSet<String>,
        projection: Projection,
    ) -> Result<Vec<StoredHandle>, StoreError> {
        let guard = self.lock()?;
        let mut matches: Vec<(i64, Handle)> = guard
            .records
            .values()
            .filter(|(_, handle)| {
                handle.field_value(field).is_some_and(|value| values.contains(value))
            })
            .cloned()
            .collect();
        drop(guard);
        matches.sort_by_key(|(key, _)| *key);
        Ok(matches
            .into_iter()
            .map(|(key, handle)| StoredHandle {
                storage_key: match projection {
                    Projection::Public => None,
                    Projection::WithStorageKey => Some(key),
                },
                handle,
            })
            .collect())
    }

    fn insert(&self, handle: &Handle) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if guard.records.contains_key(&handle.hid) {
            return Err(StoreError::Conflict(format!("handle {} already exists", handle.hid)));
        }
        guard.next_key += 1;
        let key = guard.next_key;
        guard.records.insert(handle.hid.clone(), (key, handle.clone()));
        drop(guard);
        Ok(())
    }

    fn update(&self, handle: &Handle) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let Some(entry) = guard.records.get_mut(&handle.hid) else {
            return Err(StoreError::NotFound(format!("handle {} not stored", handle.hid)));
        };
        entry.1 = handle.clone();
        drop(guard);
        Ok(())
    }

    fn delete_by_hids(&self, hids: &BTreeSet<HandleId>) -> Result<u64, StoreError> {
        let mut guard = self.lock()?;
        let mut removed = 0_u64;
        for hid in hids {
            if guard.records.remove(hid).is_some() {
                removed += 1;
            }
        }
        drop(guard);
        Ok(removed)
    }
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared handle store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedHandleStore {
    /// Inner store implementation.
    inner: Arc<dyn HandleStore + Send + Sync>,
}

impl SharedHandleStore {
    /// Wraps a handle store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl HandleStore + Send + Sync + 'static) -> Self {
        Self { inner: Arc::new(store) }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn HandleStore + Send + Sync>) -> Self {
        Self { inner: store }
    }
}

impl HandleStore for SharedHandleStore {
    fn find_by_field(
        &self,
        field: HandleField,
        values: &BTreeSet<String>,
        projection: Projection,
    ) -> Result<Vec<StoredHandle>, StoreError> {
        self.inner.find_by_field(field, values, projection)
    }

    fn insert(&self, handle: &Handle) -> Result<(), StoreError> {
        self.inner.insert(handle)
    }

    fn update(&self, handle: &Handle) -> Result<(), StoreError> {
        self.inner.update(handle)
    }

    fn delete_by_hids(&self, hids: &BTreeSet<HandleId>) -> Result<u64, StoreError> {
        self.inner.delete_by_hids(hids)
    }
}
