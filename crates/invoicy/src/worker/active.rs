//! In-memory view of jobs and items between dequeue and cleanup.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use super::job::ItemInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemPhase {
    Pending,
    Extracting,
    Persisting,
    Notifying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Job,
    Item,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveEntry {
    pub kind: EntryKind,
    pub job_id: String,
    pub process_id: Option<String>,
    pub file_name: Option<String>,
    pub media_type: Option<String>,
    pub phase: Option<ItemPhase>,
    /// Items in the job (job entries only).
    pub item_count: Option<usize>,
    pub started_at: DateTime<Utc>,
}

/// Jobs are keyed `job:{id}` and items by process id, so a single-document
/// job whose item shares its id keeps both entries. A key already in use
/// gets a `#n` suffix; each guard removes only the key it inserted.
#[derive(Debug, Default)]
pub struct ActiveRegistry {
    entries: RwLock<HashMap<String, ActiveEntry>>,
}

pub fn job_key(job_id: &str) -> String {
    format!("job:{}", job_id)
}

impl ActiveRegistry {
    pub fn track_job(&self, job_id: &str, item_count: usize) -> ActiveGuard<'_> {
        let key = self.insert(
            job_key(job_id),
            ActiveEntry {
                kind: EntryKind::Job,
                job_id: job_id.to_string(),
                process_id: None,
                file_name: None,
                media_type: None,
                phase: None,
                item_count: Some(item_count),
                started_at: Utc::now(),
            },
        );
        ActiveGuard {
            registry: self,
            key,
        }
    }

    pub fn track_item(&self, job_id: &str, item: &ItemInfo) -> ActiveGuard<'_> {
        let key = self.insert(
            item.process_id.clone(),
            ActiveEntry {
                kind: EntryKind::Item,
                job_id: job_id.to_string(),
                process_id: Some(item.process_id.clone()),
                file_name: Some(item.file_name.clone()),
                media_type: Some(item.media_type.clone()),
                phase: Some(ItemPhase::Pending),
                item_count: None,
                started_at: Utc::now(),
            },
        );
        ActiveGuard {
            registry: self,
            key,
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, ActiveEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts under `key`, or the first free `key#n`. Returns the key used.
    fn insert(&self, key: String, entry: ActiveEntry) -> String {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut unique = key.clone();
        let mut n = 2;
        while entries.contains_key(&unique) {
            unique = format!("{}#{}", key, n);
            n += 1;
        }
        entries.insert(unique.clone(), entry);
        unique
    }

    fn set_phase(&self, key: &str, phase: ItemPhase) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get_mut(key) {
            entry.phase = Some(phase);
        }
    }

    fn remove(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Removes its entry when dropped, however the work ends.
#[must_use]
pub struct ActiveGuard<'a> {
    registry: &'a ActiveRegistry,
    key: String,
}

impl ActiveGuard<'_> {
    pub fn set_phase(&self, phase: ItemPhase) {
        self.registry.set_phase(&self.key, phase);
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.registry.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(process_id: &str) -> ItemInfo {
        ItemInfo {
            process_id: process_id.to_string(),
            file_name: "a.png".to_string(),
            file_extension: ".png".to_string(),
            media_type: "image/png".to_string(),
        }
    }

    #[test]
    fn test_guard_removes_entry() {
        let registry = ActiveRegistry::default();
        {
            let _job = registry.track_job("j1", 1);
            let item = registry.track_item("j1", &info("j1"));
            item.set_phase(ItemPhase::Extracting);

            let snapshot = registry.snapshot();
            assert_eq!(snapshot.len(), 2);
            assert_eq!(snapshot["j1"].phase, Some(ItemPhase::Extracting));
            assert_eq!(snapshot["job:j1"].item_count, Some(1));
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_guard_removes_on_panic() {
        let registry = ActiveRegistry::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _item = registry.track_item("j", &info("j/a.png"));
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_overlapping_entries_with_same_id_are_kept_apart() {
        let registry = ActiveRegistry::default();
        let first = registry.track_item("same", &info("same"));
        let second = registry.track_item("same", &info("same"));
        second.set_phase(ItemPhase::Extracting);

        let keys: Vec<String> = registry.snapshot().into_keys().collect();
        assert_eq!(keys, vec!["same".to_string(), "same#2".to_string()]);

        drop(first);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["same#2"].process_id.as_deref(), Some("same"));
        assert_eq!(snapshot["same#2"].phase, Some(ItemPhase::Extracting));

        drop(second);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_serializes() {
        let registry = ActiveRegistry::default();
        let _item = registry.track_item("j", &info("j/a.png"));
        let value = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(value["j/a.png"]["phase"], "pending");
        assert_eq!(value["j/a.png"]["kind"], "item");
        assert_eq!(value["j/a.png"]["job_id"], "j");
    }
}
