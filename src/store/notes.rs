use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;

use super::keyed::{KeyedStore, Storage};

const NOTES_PREFIX: &str = "daybook.notes.";

/// A job's notes: one free-text entry per calendar day, ordered by date.
pub type NoteMap = BTreeMap<NaiveDate, String>;

/// Per-job daily notes.
///
/// A note exists iff its trimmed text is non-empty: writing whitespace-only
/// text deletes the entry instead of storing it. Stored text itself is kept
/// verbatim, untrimmed. Writes go straight through to storage; callers are
/// expected to debounce rapid edits themselves.
pub struct NotesStore {
    records: KeyedStore<NoteMap>,
}

impl NotesStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            records: KeyedStore::new(storage, NOTES_PREFIX),
        }
    }

    pub fn get_note(&self, job: &str, date: NaiveDate) -> Option<String> {
        let mut map = self.records.load(job);
        map.remove(&date)
    }

    pub fn set_note(&self, job: &str, date: NaiveDate, text: &str) {
        let mut map = self.records.load(job);
        if text.trim().is_empty() {
            map.remove(&date);
        } else {
            map.insert(date, text.to_string());
        }
        self.records.save(job, &map);
    }

    /// Days with a note for this job, ascending.
    pub fn dates_with_notes(&self, job: &str) -> Vec<NaiveDate> {
        self.records.load(job).into_keys().collect()
    }

    /// The closest earlier day that has a note, if any.
    pub fn find_previous_with_content(&self, job: &str, from: NaiveDate) -> Option<NaiveDate> {
        let map = self.records.load(job);
        map.keys().rev().find(|d| **d < from).copied()
    }

    /// The closest later day that has a note. When none exists but `today`
    /// is after `from`, jumps to `today` even though it may have no note;
    /// earlier days never get that fallback. Deliberate navigation
    /// asymmetry, not an oversight.
    pub fn find_next_with_rule(
        &self,
        job: &str,
        from: NaiveDate,
        today: NaiveDate,
    ) -> Option<NaiveDate> {
        let map = self.records.load(job);
        if let Some(date) = map.keys().find(|d| **d > from) {
            return Some(*date);
        }
        (today > from).then_some(today)
    }

    /// Every job that has at least one note, for export.
    pub fn get_all_notes(&self) -> BTreeMap<String, NoteMap> {
        let mut all = BTreeMap::new();
        for job in self.records.jobs_with_documents() {
            let map = self.records.load(&job);
            if !map.is_empty() {
                all.insert(job, map);
            }
        }
        all
    }

    /// Replace the entire notes collection across all jobs. Jobs absent
    /// from the input end up with no notes.
    pub fn import_notes(&self, notes: &BTreeMap<String, NoteMap>) {
        for job in self.records.jobs_with_documents() {
            self.records.remove(&job);
        }
        for (job, map) in notes {
            self.records.save(job, map);
        }
    }
}
