//! # Permission Sets
//!
//! A [`PermissionSet`] is the descriptive list of integer tokens attached to an
//! actor or a command. The set does not enforce anything on its own: an
//! [`Authorizer`](crate::Authorizer) reads it during verification.
//!
//! An empty set means "nothing extra is required beyond what the authorizer
//! always demands".

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// An unordered set of permission tokens.
#[derive(Default)]
pub struct PermissionSet {
    tokens: RwLock<BTreeSet<i32>>,
}

impl PermissionSet {
    pub fn new<I: IntoIterator<Item = i32>>(tokens: I) -> Self {
        Self {
            tokens: RwLock::new(tokens.into_iter().collect()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn contains(&self, token: i32) -> bool {
        self.read().contains(&token)
    }

    /// True iff at least one of `tokens` is in the set (logical OR).
    pub fn contains_any(&self, tokens: &[i32]) -> bool {
        let set = self.read();
        tokens.iter().any(|t| set.contains(t))
    }

    pub fn add(&self, token: i32) {
        self.write().insert(token);
    }

    pub fn add_all<I: IntoIterator<Item = i32>>(&self, tokens: I) {
        self.write().extend(tokens);
    }

    pub fn remove(&self, token: i32) -> bool {
        self.write().remove(&token)
    }

    /// Snapshot of the tokens in ascending order.
    pub fn values(&self) -> Vec<i32> {
        self.read().iter().copied().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeSet<i32>> {
        self.tokens.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeSet<i32>> {
        self.tokens.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.read().iter()).finish()
    }
}

impl<const N: usize> From<[i32; N]> for PermissionSet {
    fn from(tokens: [i32; N]) -> Self {
        Self::new(tokens)
    }
}

impl From<Vec<i32>> for PermissionSet {
    fn from(tokens: Vec<i32>) -> Self {
        Self::new(tokens)
    }
}
