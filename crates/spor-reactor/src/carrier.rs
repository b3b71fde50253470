//! Persistent typed key/value carrier.
//!
//! The [`Carrier`] is the ambient bag that flows alongside data through a
//! pipeline, independent of thread identity. It is persistent: [`Carrier::put`]
//! never mutates the receiver, it returns a new carrier with the old entries
//! plus the override. Entries sit behind `Arc`, so cloning a carrier is cheap
//! and carriers are safe to share across threads.
//!
//! Keys are the [`TypeId`] of the stored value type; one value per type.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

type Entry = (TypeId, &'static str, Arc<dyn Any + Send + Sync>);

/// Ordered, persistent mapping from value type to value.
#[derive(Clone, Default)]
pub struct Carrier {
    entries: Vec<Entry>,
}

impl Carrier {
    /// A carrier with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether a value of type `T` is present.
    pub fn has_key<T: 'static>(&self) -> bool {
        let key = TypeId::of::<T>();
        self.entries.iter().any(|(k, _, _)| *k == key)
    }

    /// The value stored under type `T`, if present.
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        let key = TypeId::of::<T>();
        self.entries
            .iter()
            .find(|(k, _, _)| *k == key)
            .and_then(|(_, _, value)| value.downcast_ref::<T>())
            .cloned()
    }

    /// The value stored under type `T`, or `default` when absent.
    pub fn get_or_default<T: Clone + Send + Sync + 'static>(&self, default: T) -> T {
        self.get::<T>().unwrap_or(default)
    }

    /// A new carrier with `value` stored under type `T`.
    ///
    /// Replaces an existing entry in place (insertion order is kept);
    /// otherwise appends. The receiver is untouched.
    #[must_use = "put returns a new carrier; the receiver is unchanged"]
    pub fn put<T: Send + Sync + 'static>(&self, value: T) -> Carrier {
        let key = TypeId::of::<T>();
        let mut entries = self.entries.clone();
        let slot: Arc<dyn Any + Send + Sync> = Arc::new(value);
        match entries.iter_mut().find(|(k, _, _)| *k == key) {
            Some(entry) => entry.2 = slot,
            None => entries.push((key, type_name::<T>(), slot)),
        }
        Carrier { entries }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the carrier holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(_, name, _)| name))
            .finish()
    }
}
