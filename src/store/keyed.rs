use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// How many stored documents failed to parse and were replaced by a default
/// value. Corruption is recovered silently, so this counter is the only
/// place it stays observable.
static PARSE_FAILURES: AtomicU64 = AtomicU64::new(0);

pub fn parse_failure_count() -> u64 {
    PARSE_FAILURES.load(Ordering::Relaxed)
}

pub(crate) fn record_parse_failure() {
    PARSE_FAILURES.fetch_add(1, Ordering::Relaxed);
}

/// Narrow string-keyed persistence port. Implementations never fail
/// visibly: a read that cannot be served is `None`, a write that cannot be
/// performed is logged and dropped.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    /// Every key currently present, in no particular order.
    fn keys(&self) -> Vec<String>;
}

/// In-memory storage, used by tests.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

/// One JSON document per key under a data directory. Writes go through a
/// temp file and a rename, so a reader never observes a partial document.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            log::error!("Failed to create {}: {}", self.dir.display(), e);
            return;
        }
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        if let Err(e) = std::fs::write(&tmp, value).and_then(|()| std::fs::rename(&tmp, &path)) {
            log::error!("Failed to write {}: {}", path.display(), e);
        }
    }

    fn remove(&self, key: &str) {
        let path = self.path_for(key);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::error!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }

    fn keys(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().into_string().ok()?;
                name.strip_suffix(".json").map(str::to_string)
            })
            .collect()
    }
}

/// Job ids come from user input and end up inside storage keys; reject
/// anything that cannot safely name a document.
pub fn is_valid_job_id(job: &str) -> bool {
    !job.trim().is_empty()
        && job.len() <= 128
        && !job
            .chars()
            .any(|c| c.is_control() || c == '/' || c == '\\')
}

/// Per-job JSON documents under a fixed key prefix, e.g.
/// `daybook.notes.<job>`. A document that is missing or unreadable loads as
/// the record's default value.
pub struct KeyedStore<T> {
    storage: Arc<dyn Storage>,
    prefix: &'static str,
    _record: PhantomData<T>,
}

impl<T> KeyedStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(storage: Arc<dyn Storage>, prefix: &'static str) -> Self {
        Self {
            storage,
            prefix,
            _record: PhantomData,
        }
    }

    fn key_for(&self, job: &str) -> String {
        format!("{}{}", self.prefix, job)
    }

    pub fn load(&self, job: &str) -> T {
        if !is_valid_job_id(job) {
            return T::default();
        }
        let key = self.key_for(job);
        let Some(raw) = self.storage.get(&key) else {
            return T::default();
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                record_parse_failure();
                log::warn!("Discarding unreadable document {}: {}", key, e);
                T::default()
            }
        }
    }

    pub fn save(&self, job: &str, value: &T) {
        if !is_valid_job_id(job) {
            log::warn!("Refusing to save under invalid job id {:?}", job);
            return;
        }
        let key = self.key_for(job);
        match serde_json::to_string(value) {
            Ok(raw) => self.storage.set(&key, &raw),
            Err(e) => log::error!("Failed to serialize {}: {}", key, e),
        }
    }

    pub fn remove(&self, job: &str) {
        if is_valid_job_id(job) {
            self.storage.remove(&self.key_for(job));
        }
    }

    /// Jobs that currently have a document under this prefix.
    pub fn jobs_with_documents(&self) -> Vec<String> {
        self.storage
            .keys()
            .into_iter()
            .filter_map(|key| key.strip_prefix(self.prefix).map(str::to_string))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn memory_store() -> KeyedStore<BTreeMap<String, String>> {
        KeyedStore::new(Arc::new(MemoryStorage::new()), "test.records.")
    }

    #[test]
    fn missing_document_loads_default() {
        let store = memory_store();
        assert!(store.load("alpha").is_empty());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let store = memory_store();
        let mut record = BTreeMap::new();
        record.insert("k".to_string(), "v".to_string());
        store.save("alpha", &record);
        assert_eq!(store.load("alpha"), record);
        // Other jobs are unaffected
        assert!(store.load("beta").is_empty());
    }

    #[test]
    fn corrupt_document_loads_default_and_is_counted() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("test.records.alpha", "{not json");
        let store: KeyedStore<BTreeMap<String, String>> =
            KeyedStore::new(Arc::clone(&storage) as Arc<dyn Storage>, "test.records.");

        let before = parse_failure_count();
        assert!(store.load("alpha").is_empty());
        assert!(parse_failure_count() > before);
    }

    #[test]
    fn invalid_job_ids_are_rejected() {
        assert!(is_valid_job_id("Client A"));
        assert!(!is_valid_job_id(""));
        assert!(!is_valid_job_id("   "));
        assert!(!is_valid_job_id("a/b"));
        assert!(!is_valid_job_id("a\\b"));
        assert!(!is_valid_job_id("a\nb"));
        assert!(!is_valid_job_id(&"x".repeat(129)));
    }

    #[test]
    fn save_under_invalid_job_id_is_dropped() {
        let store = memory_store();
        let mut record = BTreeMap::new();
        record.insert("k".to_string(), "v".to_string());
        store.save("../escape", &record);
        assert!(store.jobs_with_documents().is_empty());
    }

    #[test]
    fn jobs_with_documents_strips_prefix() {
        let store = memory_store();
        store.save("alpha", &BTreeMap::new());
        store.save("beta", &BTreeMap::new());
        let mut jobs = store.jobs_with_documents();
        jobs.sort();
        assert_eq!(jobs, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.set("daybook.notes.alpha", r#"{"2024-01-01":"hi"}"#);
        assert_eq!(
            storage.get("daybook.notes.alpha").as_deref(),
            Some(r#"{"2024-01-01":"hi"}"#)
        );
        assert_eq!(storage.keys(), vec!["daybook.notes.alpha".to_string()]);

        storage.remove("daybook.notes.alpha");
        assert_eq!(storage.get("daybook.notes.alpha"), None);
        assert!(storage.keys().is_empty());
        // Removing again is a no-op
        storage.remove("daybook.notes.alpha");
    }

    #[test]
    fn file_storage_missing_dir_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("never-created"));
        assert_eq!(storage.get("daybook.jobs"), None);
        assert!(storage.keys().is_empty());
    }
}
