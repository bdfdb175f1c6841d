//! Focus tracker: one group cache per window, keyed by window title
//!
//! The active window owns a live [`GroupCache`]. When focus moves away, the
//! cache is encoded into the property store under the outgoing window id and
//! dropped; the incoming window's cache is decoded from the store, or created
//! fresh when nothing usable is stored.

use anyhow::{ensure, Result};
use grpcache::GroupCache;
use tracing::{debug, info, warn};

use crate::event::{Event, WindowId};
use crate::keyboard::Keyboard;
use crate::store::PropertyStore;

/// Default entries per window cache
pub const PER_WINDOW_CACHE_SIZE: u32 = 50;

/// The focused window and its cache
struct ActiveWindow {
    window: WindowId,
    title: String,
    cache: GroupCache,
}

/// Drives per-window caches from focus, title and group events
pub struct FocusTracker<S, K> {
    store: S,
    keyboard: K,
    capacity: u32,
    seed: Option<u64>,
    active: Option<ActiveWindow>,
}

impl<S: PropertyStore, K: Keyboard> FocusTracker<S, K> {
    /// Create a tracker
    ///
    /// # Arguments
    /// * `capacity` - Entries per newly created window cache
    /// * `seed` - Fixed hash seed for new caches; `None` picks a fresh one each time
    pub fn new(store: S, keyboard: K, capacity: u32, seed: Option<u64>) -> Result<Self> {
        ensure!(capacity > 0, "cache capacity must be greater than 0");

        Ok(Self {
            store,
            keyboard,
            capacity,
            seed,
            active: None,
        })
    }

    /// Apply one event
    pub fn handle(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Active { window, title } => self.handle_active(window, title.as_deref()),
            Event::Title { window, title } => self.handle_title(window, title.as_deref()),
            Event::Group(group) => {
                self.handle_group(group);
                Ok(())
            }
            Event::Destroy(window) => self.handle_destroy(window),
        }
    }

    /// The active window changed
    pub fn handle_active(&mut self, window: WindowId, title: Option<&str>) -> Result<()> {
        debug!("Active window changed to {}", window);
        if self.focus(window, title)? {
            self.apply_remembered_group()?;
        }
        Ok(())
    }

    /// A window title changed; only the active window is tracked
    pub fn handle_title(&mut self, window: WindowId, title: Option<&str>) -> Result<()> {
        if self.active_window() != Some(window) {
            debug!("Ignoring title change of inactive window {}", window);
            return Ok(());
        }

        debug!("Window title changed");
        if self.focus(window, title)? {
            self.apply_remembered_group()?;
        }
        Ok(())
    }

    /// The keyboard group changed; remember it for the current title
    pub fn handle_group(&mut self, group: u8) {
        self.keyboard.observe_group(group);

        let Some(active) = self.active.as_mut() else {
            debug!("Group changed to {} with no active window", group);
            return;
        };

        match active.cache.set(&active.title, group) {
            Ok(()) => info!("Set remembered group to {}", group),
            Err(e) => warn!("Cannot remember group {}: {}", group, e),
        }
    }

    /// A window went away; its stored state goes with it
    pub fn handle_destroy(&mut self, window: WindowId) -> Result<()> {
        if self.active_window() == Some(window) {
            info!("Active window {} destroyed, dropping its cache", window);
            self.active = None;
        }
        self.store.forget(window)?;
        self.store.flush()
    }

    /// Persist the active cache and flush the store
    pub fn shutdown(&mut self) -> Result<()> {
        if let Some(active) = self.active.take() {
            info!("Cache stats for window {}: {}", active.window, active.cache.stats());
            self.persist(active)?;
        }
        self.store.flush()
    }

    /// Currently focused window, if any
    pub fn active_window(&self) -> Option<WindowId> {
        self.active.as_ref().map(|a| a.window)
    }

    /// Switch to `window` and record its title; returns whether anything changed
    fn focus(&mut self, window: WindowId, title: Option<&str>) -> Result<bool> {
        if window == 0 {
            return Ok(false);
        }

        let mut changed = false;
        let active = match self.active.take() {
            Some(active) if active.window == window => active,
            previous => {
                if let Some(previous) = previous {
                    let outgoing = previous.window;
                    if let Err(e) = self.persist(previous) {
                        warn!("Cannot persist cache of window {}: {:#}", outgoing, e);
                    }
                }
                changed = true;
                ActiveWindow {
                    window,
                    title: String::new(),
                    cache: self.restore(window)?,
                }
            }
        };
        let active = self.active.insert(active);

        match title {
            Some(title) => {
                if changed || active.title != title {
                    info!("Window title of active window {} is now {}", window, title);
                    active.title = title.to_string();
                    changed = true;
                }
            }
            None => {
                active.title.clear();
                warn!("Could not get window title for window {}", window);
            }
        }

        Ok(changed)
    }

    /// Lock the remembered group for the current title, or remember the current group
    fn apply_remembered_group(&mut self) -> Result<()> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };

        match active.cache.get(&active.title) {
            Some(group) => {
                info!("Restoring previous group {}", group);
                self.keyboard.lock_group(group)?;
            }
            None => {
                let group = self.keyboard.current_group();
                match active.cache.set(&active.title, group) {
                    Ok(()) => info!("Set remembered group to {}", group),
                    Err(e) => warn!("Cannot remember group {}: {}", group, e),
                }
            }
        }
        Ok(())
    }

    fn persist(&mut self, outgoing: ActiveWindow) -> Result<()> {
        let blob = outgoing.cache.encode();
        debug!(
            "Persisting {} entries for window {}",
            outgoing.cache.len(),
            outgoing.window
        );
        self.store.save(outgoing.window, &blob)?;
        self.store.flush()
    }

    fn restore(&self, window: WindowId) -> Result<GroupCache> {
        match self.store.load(window) {
            Ok(Some(blob)) => match GroupCache::decode(&blob) {
                Ok(cache) => {
                    debug!(
                        "Restored {} entries for window {} (capacity {})",
                        cache.len(),
                        window,
                        cache.capacity()
                    );
                    return Ok(cache);
                }
                Err(e) => warn!("Discarding stored cache of window {}: {}", window, e),
            },
            Ok(None) => {}
            Err(e) => warn!("Cannot load cache of window {}: {:#}", window, e),
        }

        let cache = match self.seed {
            Some(seed) => GroupCache::with_seed(self.capacity, seed)?,
            None => GroupCache::new(self.capacity)?,
        };
        Ok(cache)
    }
}

#[cfg(test)]
impl<S: PropertyStore, K: Keyboard> FocusTracker<S, K> {
    /// Title of the focused window, if any
    pub fn active_title(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.title.as_str())
    }

    /// Live cache of the focused window, if any
    pub fn active_cache(&self) -> Option<&GroupCache> {
        self.active.as_ref().map(|a| &a.cache)
    }

    /// Backing property store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Keyboard being driven
    pub fn keyboard(&self) -> &K {
        &self.keyboard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::LineKeyboard;
    use crate::store::{FileStore, MemoryStore};
    use tempfile::TempDir;

    type TestTracker = FocusTracker<MemoryStore, LineKeyboard<Vec<u8>>>;

    fn tracker() -> TestTracker {
        FocusTracker::new(MemoryStore::new(), LineKeyboard::new(Vec::new(), 0), 50, Some(0))
            .unwrap()
    }

    fn locks(tracker: &TestTracker) -> Vec<String> {
        String::from_utf8(tracker.keyboard().output().to_vec())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = FocusTracker::new(MemoryStore::new(), LineKeyboard::new(Vec::new(), 0), 0, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_first_focus_remembers_current_group() {
        let mut t = tracker();

        t.handle_active(1, Some("Terminal")).unwrap();

        assert_eq!(t.active_window(), Some(1));
        assert_eq!(t.active_title(), Some("Terminal"));
        let cache = t.active_cache().unwrap();
        assert_eq!(cache.len(), 1);
        assert!(locks(&t).is_empty());
    }

    #[test]
    fn test_title_change_restores_group() {
        let mut t = tracker();

        t.handle_active(1, Some("mail")).unwrap();
        t.handle_group(1);
        t.handle_title(1, Some("editor")).unwrap();
        t.handle_group(0);
        t.handle_title(1, Some("mail")).unwrap();

        assert_eq!(locks(&t), ["lock 1"]);
        assert_eq!(t.keyboard().current_group(), 1);
    }

    #[test]
    fn test_same_title_is_not_a_change() {
        let mut t = tracker();

        t.handle_active(1, Some("mail")).unwrap();
        t.handle_group(2);
        t.handle_title(1, Some("mail")).unwrap();
        t.handle_active(1, Some("mail")).unwrap();

        assert!(locks(&t).is_empty());
    }

    #[test]
    fn test_focus_switch_persists_and_restores() {
        let mut t = tracker();

        t.handle_active(1, Some("chat")).unwrap();
        t.handle_group(2);
        t.handle_active(2, Some("shell")).unwrap();

        let stored = t.store().load(1).unwrap().unwrap();
        let mut decoded = GroupCache::decode(&stored).unwrap();
        assert_eq!(decoded.get("chat"), Some(2));

        t.handle_group(0);
        t.handle_active(1, Some("chat")).unwrap();

        assert_eq!(locks(&t), ["lock 2"]);
        assert_eq!(t.active_cache().unwrap().len(), 1);
    }

    #[test]
    fn test_same_title_in_other_window_is_independent() {
        let mut t = tracker();

        t.handle_active(1, Some("index.html")).unwrap();
        t.handle_group(1);
        t.handle_active(2, Some("index.html")).unwrap();

        // Window 2 starts empty, so it records the current group instead of locking
        assert!(locks(&t).is_empty());
        assert_eq!(t.active_cache().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_blob_falls_back_to_fresh_cache() {
        let mut t = tracker();
        t.store().save(7, "00000003 00000000 00000001=x").unwrap();

        t.handle_active(7, Some("broken")).unwrap();

        let cache = t.active_cache().unwrap();
        assert_eq!(cache.capacity(), 50);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_window_zero_ignored() {
        let mut t = tracker();

        t.handle_active(0, Some("root")).unwrap();

        assert_eq!(t.active_window(), None);
    }

    #[test]
    fn test_missing_title_uses_empty_key() {
        let mut t = tracker();

        t.handle_active(1, None).unwrap();

        assert_eq!(t.active_title(), Some(""));
        assert_eq!(t.active_cache().unwrap().len(), 1);
    }

    #[test]
    fn test_inactive_title_change_ignored() {
        let mut t = tracker();

        t.handle_active(1, Some("a")).unwrap();
        t.handle_title(2, Some("b")).unwrap();

        assert_eq!(t.active_window(), Some(1));
        assert_eq!(t.active_title(), Some("a"));
    }

    #[test]
    fn test_group_out_of_range_not_remembered() {
        let mut t = tracker();

        t.handle_active(1, Some("a")).unwrap();
        t.handle_group(12);

        assert_eq!(t.keyboard().current_group(), 12);
        let mut cache = GroupCache::decode(&t.active_cache().unwrap().encode()).unwrap();
        assert_eq!(cache.get("a"), Some(0));
    }

    #[test]
    fn test_destroy_drops_state() {
        let mut t = tracker();

        t.handle_active(1, Some("a")).unwrap();
        t.handle_active(2, Some("b")).unwrap();
        assert!(t.store().load(1).unwrap().is_some());

        t.handle_destroy(1).unwrap();
        t.handle_destroy(2).unwrap();
        t.shutdown().unwrap();

        assert_eq!(t.active_window(), None);
        assert!(t.store().load(1).unwrap().is_none());
        assert!(t.store().load(2).unwrap().is_none());
    }

    #[test]
    fn test_event_dispatch() {
        let mut t = tracker();

        t.handle(Event::Active { window: 3, title: Some("x".to_string()) }).unwrap();
        t.handle(Event::Group(4)).unwrap();
        t.handle(Event::Title { window: 3, title: Some("y".to_string()) }).unwrap();
        t.handle(Event::Title { window: 3, title: Some("x".to_string()) }).unwrap();

        assert_eq!(locks(&t), ["lock 4"]);
    }

    #[test]
    fn test_shutdown_persists_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("groups.json");

        {
            let store = FileStore::open(&path, Some(":0")).unwrap();
            let mut t =
                FocusTracker::new(store, LineKeyboard::new(Vec::new(), 0), 8, Some(0x6523abcd))
                    .unwrap();
            t.handle_active(0x3a00007, Some("Terminal")).unwrap();
            t.handle_group(1);
            t.shutdown().unwrap();
        }

        let store = FileStore::open(&path, Some(":0")).unwrap();
        let blob = store.load(0x3a00007).unwrap().unwrap();
        // hash_key("Terminal", 0x6523abcd) = 0441a0c0
        assert_eq!(blob, "00000008 6523abcd 0441a0c0=1");

        let mut t = FocusTracker::new(store, LineKeyboard::new(Vec::new(), 0), 8, None).unwrap();
        t.handle_active(0x3a00007, Some("Terminal")).unwrap();
        assert_eq!(
            String::from_utf8(t.keyboard().output().to_vec()).unwrap(),
            "lock 1\n"
        );
    }

    #[test]
    fn test_recycled_window_id_starts_fresh_in_new_session() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("groups.json");

        {
            let store = FileStore::open(&path, Some(":0")).unwrap();
            let mut t = FocusTracker::new(store, LineKeyboard::new(Vec::new(), 0), 8, Some(0))
                .unwrap();
            t.handle_active(0x3a00007, Some("Terminal")).unwrap();
            t.handle_group(1);
            t.shutdown().unwrap();
        }

        let store = FileStore::open(&path, Some(":0/next")).unwrap();
        let mut t = FocusTracker::new(store, LineKeyboard::new(Vec::new(), 0), 8, Some(0)).unwrap();
        t.handle_active(0x3a00007, Some("Terminal")).unwrap();

        assert!(t.keyboard().output().is_empty());
        assert_eq!(t.active_cache().unwrap().len(), 1);
    }
}
