//! Keyed set difference between two collections.
//!
//! The engine only looks at keys. Values are carried through so callers can
//! compare payloads themselves (for example, a child's text).

use std::collections::BTreeMap;
use std::fmt;

/// Result of [`diff`]: keys only in `next`, keys only in `previous`, and keys
/// in both with both values.
#[derive(Debug, Clone, PartialEq)]
pub struct Changes<K: Ord, A, B> {
    pub created: BTreeMap<K, B>,
    pub deleted: BTreeMap<K, A>,
    pub same: BTreeMap<K, (A, B)>,
}

impl<K: Ord, A, B> Changes<K, A, B> {
    /// True when nothing was created or deleted.
    pub fn is_stable(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }
}

impl<K: Ord, A, B> fmt::Display for Changes<K, A, B> {
    /// Compact delta summary, e.g. `c1 d0 s2`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "c{} d{} s{}",
            self.created.len(),
            self.deleted.len(),
            self.same.len()
        )
    }
}

/// Compare two keyed collections.
///
/// Pure and total: `created` = keys(next) − keys(previous), `deleted` =
/// keys(previous) − keys(next), `same` = keys(previous) ∩ keys(next).
pub fn diff<K, A, B>(previous: &BTreeMap<K, A>, next: &BTreeMap<K, B>) -> Changes<K, A, B>
where
    K: Ord + Clone,
    A: Clone,
    B: Clone,
{
    let mut changes = Changes {
        created: BTreeMap::new(),
        deleted: BTreeMap::new(),
        same: BTreeMap::new(),
    };
    for (key, prev) in previous {
        match next.get(key) {
            Some(value) => {
                changes.same.insert(key.clone(), (prev.clone(), value.clone()));
            }
            None => {
                changes.deleted.insert(key.clone(), prev.clone());
            }
        }
    }
    for (key, value) in next {
        if !previous.contains_key(key) {
            changes.created.insert(key.clone(), value.clone());
        }
    }
    changes
}
