//! Scope-bound resource acquisition
//!
//! [`ScopedResource`] ties a disposable resource's lifetime to a logical
//! scope: created lazily on first use, replaced when the declared
//! dependencies change (old disposed strictly before the new one is
//! created), and disposed exactly once when the scope drops. This is
//! memoized-resource-with-cleanup, not resource-per-use.

use crate::resources::Disposable;

/// A lazily created resource whose lifetime follows a dependency key
pub struct ScopedResource<T: Disposable, D: PartialEq> {
    state: Option<(D, T)>,
}

impl<T: Disposable, D: PartialEq> ScopedResource<T, D> {
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Get the resource for `deps`, creating it on first use or after a
    /// dependency change
    ///
    /// On change the previous resource is disposed before `factory` runs.
    pub fn acquire<F>(&mut self, deps: D, factory: F) -> &mut T
    where
        F: FnOnce() -> T,
    {
        let stale = match &self.state {
            Some((current, _)) => *current != deps,
            None => false,
        };
        if stale {
            if let Some((_, mut old)) = self.state.take() {
                old.dispose();
            }
        }
        if self.state.is_none() {
            self.state = Some((deps, factory()));
        }
        // Just ensured above
        &mut self.state.as_mut().unwrap().1
    }

    /// The resource, if it has been created
    pub fn get(&self) -> Option<&T> {
        self.state.as_ref().map(|(_, resource)| resource)
    }

    /// Dispose eagerly instead of waiting for the scope to drop
    pub fn release(&mut self) {
        if let Some((_, mut resource)) = self.state.take() {
            resource.dispose();
        }
    }
}

impl<T: Disposable, D: PartialEq> Default for ScopedResource<T, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Disposable, D: PartialEq> Drop for ScopedResource<T, D> {
    fn drop(&mut self) {
        self.release();
    }
}
