//! Session-scoped lookup of mounted paginators by tag.
//!
//! Mounting returns a [`Registration`]; dropping it removes the entry, so a
//! paginator that goes away can never be reached through a stale handle.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::pagination::PageHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageTag(&'static str);

impl PageTag {
    pub const CLIPS: PageTag = PageTag("clips");
    pub const DATES: PageTag = PageTag("dates");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for PageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

type Entries = RefCell<HashMap<PageTag, PageHandle>>;

#[derive(Clone, Default)]
pub struct PageRegistry {
    entries: Rc<Entries>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `handle` under `tag`. A second mount under the same tag
    /// replaces the first.
    pub fn register(&self, tag: PageTag, handle: PageHandle) -> Registration {
        let previous = self.entries.borrow_mut().insert(tag, handle.clone());
        match previous {
            Some(old) if !old.same_as(&handle) => {
                warn!("[registry] '{}' mounted twice; newest mount wins", tag)
            }
            _ => debug!("[registry] mounted '{}'", tag),
        }
        Registration {
            entries: Rc::downgrade(&self.entries),
            tag,
            handle,
        }
    }

    pub fn get(&self, tag: PageTag) -> Option<PageHandle> {
        self.entries.borrow().get(&tag).cloned()
    }
}

/// Keeps a registry entry alive. Dropping it unregisters the handle, unless
/// a newer mount has already taken the tag.
pub struct Registration {
    entries: Weak<Entries>,
    tag: PageTag,
    handle: PageHandle,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Some(entries) = self.entries.upgrade() else {
            return;
        };
        let mut entries = entries.borrow_mut();
        if entries.get(&self.tag).is_some_and(|h| h.same_as(&self.handle)) {
            entries.remove(&self.tag);
            debug!("[registry] unmounted '{}'", self.tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_unregisters() {
        let registry = PageRegistry::new();
        let handle = PageHandle::default();
        let reg = registry.register(PageTag::CLIPS, handle.clone());
        assert!(registry.get(PageTag::CLIPS).is_some_and(|h| h.same_as(&handle)));
        assert!(registry.get(PageTag::DATES).is_none());

        drop(reg);
        assert!(registry.get(PageTag::CLIPS).is_none());
    }

    #[test]
    fn stale_registration_does_not_evict_newer_mount() {
        let registry = PageRegistry::new();
        let first = PageHandle::default();
        let second = PageHandle::default();

        let old = registry.register(PageTag::CLIPS, first);
        let new = registry.register(PageTag::CLIPS, second.clone());
        drop(old);
        assert!(registry.get(PageTag::CLIPS).is_some_and(|h| h.same_as(&second)));

        drop(new);
        assert!(registry.get(PageTag::CLIPS).is_none());
    }

    #[test]
    fn registration_outliving_registry_is_harmless() {
        let registry = PageRegistry::new();
        let reg = registry.register(PageTag::DATES, PageHandle::default());
        drop(registry);
        drop(reg);
    }
}
