use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use crate::bundle::{Bundle, ObjectKey};

/// Failures reported by a [`SecretStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("secret {0} not found")]
    NotFound(ObjectKey),

    #[error("secret {0} already exists")]
    AlreadyExists(ObjectKey),
}

/// A key-value store of named bundles, addressed by namespace and name.
///
/// Implementations must be safe to share between threads.
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &ObjectKey) -> Result<Bundle, StoreError>;

    /// Stores `bundle` under its own identity; never overwrites.
    fn create(&self, bundle: &Bundle) -> Result<(), StoreError>;
}

/// An in-process [`SecretStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    bundles: Mutex<BTreeMap<ObjectKey, Bundle>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a bundle.
    pub fn insert(&self, bundle: Bundle) {
        self.lock().insert(bundle.identity.clone(), bundle);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ObjectKey, Bundle>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.bundles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, key: &ObjectKey) -> Result<Bundle, StoreError> {
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    fn create(&self, bundle: &Bundle) -> Result<(), StoreError> {
        let mut bundles = self.lock();
        if bundles.contains_key(&bundle.identity) {
            return Err(StoreError::AlreadyExists(bundle.identity.clone()));
        }
        bundles.insert(bundle.identity.clone(), bundle.clone());
        Ok(())
    }
}
