//! Event debouncing for the watch loop.
//!
//! File events arrive in bursts (editors write temp files, fire several
//! modify events per save). The debouncer collects a burst, deduplicates
//! per path, and releases the batch once the burst has settled.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

pub const DEBOUNCE_MS: u64 = 300;
pub const REBUILD_COOLDOWN_MS: u64 = 800;

/// What happened to a path within the current burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// Pure debouncer: only handles timing and event deduplication.
pub struct Debouncer {
    /// Path -> ChangeKind (dedup is free via HashMap key uniqueness)
    changes: FxHashMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
    last_run: Option<Instant>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self {
            changes: FxHashMap::default(),
            last_event: None,
            last_run: None,
        }
    }

    /// Add a notify event, applying dedup rules:
    /// - Removed + Created/Modified -> the restore event wins
    /// - Modified + Removed -> upgrade to Removed
    /// - Created + Removed -> discard (appeared then vanished)
    /// - same kind: first event wins
    pub fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(modify) => {
                // Metadata-only changes (mtime/chmod noise) can trigger
                // endless rebuild loops
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
                ChangeKind::Modified
            }
            _ => return,
        };

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }
            let path = path.clone();

            if let Some(&existing) = self.changes.get(&path) {
                match (existing, kind) {
                    (ChangeKind::Removed, ChangeKind::Created | ChangeKind::Modified) => {
                        self.changes.insert(path, kind);
                    }
                    (ChangeKind::Modified, ChangeKind::Removed) => {
                        self.changes.insert(path, ChangeKind::Removed);
                    }
                    (ChangeKind::Created, ChangeKind::Removed) => {
                        self.changes.remove(&path);
                    }
                    _ => continue,
                }
                self.last_event = Some(Instant::now());
                continue;
            }

            crate::debug!("watch"; "event {}: {}", kind.label(), path.display());
            self.changes.insert(path, kind);
            self.last_event = Some(Instant::now());
        }
    }

    /// Take the collected batch if the debounce window and cooldown have
    /// both elapsed.
    pub fn take_if_ready(&mut self) -> Option<FxHashMap<PathBuf, ChangeKind>> {
        if !self.is_ready() {
            return None;
        }

        let changes = std::mem::take(&mut self.changes);
        self.last_event = None;

        if changes.is_empty() {
            return None;
        }

        self.last_run = Some(Instant::now());
        Some(changes)
    }

    fn is_ready(&self) -> bool {
        let Some(last_event) = self.last_event else {
            return false;
        };
        if last_event.elapsed() < Duration::from_millis(DEBOUNCE_MS) {
            return false;
        }
        if let Some(last_run) = self.last_run
            && last_run.elapsed() < Duration::from_millis(REBUILD_COOLDOWN_MS)
        {
            return false;
        }
        true
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.changes.len()
    }

    #[cfg(test)]
    pub fn change_for(&self, path: &Path) -> Option<ChangeKind> {
        self.changes.get(path).copied()
    }
}

/// Editor swap/backup files that should never trigger a rebuild.
fn is_temp_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    name.ends_with('~')
        || name.ends_with(".swp")
        || name.ends_with(".swx")
        || name.ends_with(".tmp")
        || name.starts_with(".#")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event(paths: Vec<&str>, kind: notify::EventKind) -> notify::Event {
        notify::Event {
            kind,
            paths: paths.into_iter().map(PathBuf::from).collect(),
            attrs: Default::default(),
        }
    }

    fn modify_kind() -> notify::EventKind {
        notify::EventKind::Modify(notify::event::ModifyKind::Data(
            notify::event::DataChange::Any,
        ))
    }

    fn create_kind() -> notify::EventKind {
        notify::EventKind::Create(notify::event::CreateKind::File)
    }

    fn remove_kind() -> notify::EventKind {
        notify::EventKind::Remove(notify::event::RemoveKind::File)
    }

    #[test]
    fn test_empty_debouncer_is_not_ready() {
        let mut debouncer = Debouncer::new();
        assert!(debouncer.take_if_ready().is_none());
    }

    #[test]
    fn test_events_dedup_per_path() {
        let mut debouncer = Debouncer::new();
        debouncer.add_event(&make_event(vec!["/src/scss/style.scss"], modify_kind()));
        debouncer.add_event(&make_event(vec!["/src/scss/style.scss"], modify_kind()));
        assert_eq!(debouncer.pending(), 1);
    }

    #[test]
    fn test_created_then_removed_discards() {
        let mut debouncer = Debouncer::new();
        debouncer.add_event(&make_event(vec!["/src/js/new.js"], create_kind()));
        debouncer.add_event(&make_event(vec!["/src/js/new.js"], remove_kind()));
        assert_eq!(debouncer.pending(), 0);
    }

    #[test]
    fn test_modified_then_removed_upgrades() {
        let mut debouncer = Debouncer::new();
        debouncer.add_event(&make_event(vec!["/src/js/a.js"], modify_kind()));
        debouncer.add_event(&make_event(vec!["/src/js/a.js"], remove_kind()));
        assert_eq!(
            debouncer.change_for(Path::new("/src/js/a.js")),
            Some(ChangeKind::Removed)
        );
    }

    #[test]
    fn test_metadata_and_temp_files_ignored() {
        let mut debouncer = Debouncer::new();
        debouncer.add_event(&make_event(
            vec!["/src/js/a.js"],
            notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
                notify::event::MetadataKind::Any,
            )),
        ));
        debouncer.add_event(&make_event(vec!["/src/js/.#a.js"], modify_kind()));
        debouncer.add_event(&make_event(vec!["/src/js/a.js.swp"], modify_kind()));
        assert_eq!(debouncer.pending(), 0);
    }
}
