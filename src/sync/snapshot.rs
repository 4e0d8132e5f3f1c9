use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::task::Task;
use crate::store::jobs::JobList;
use crate::store::notes::{NoteMap, NotesStore};
use crate::store::tasks::TaskStore;

/// The complete exported state of every job's notes and tasks, plus the
/// job list itself. A total replacement artifact: it carries no versioning
/// and no merge metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub jobs: Vec<String>,
    #[serde(default)]
    pub notes: BTreeMap<String, NoteMap>,
    #[serde(default)]
    pub tasks: BTreeMap<String, Vec<Task>>,
}

/// Package the current job list and every job's notes and tasks.
pub fn export_snapshot(jobs: &JobList, notes: &NotesStore, tasks: &TaskStore) -> Snapshot {
    Snapshot {
        jobs: jobs.jobs(),
        notes: notes.get_all_notes(),
        tasks: tasks.get_all_tasks(),
    }
}

/// Replace all local state with the snapshot's, in both stores and the job
/// list. Not atomic across the three: an interrupt mid-import can leave
/// them mixed.
pub fn import_snapshot(
    snapshot: &Snapshot,
    jobs: &JobList,
    notes: &NotesStore,
    tasks: &TaskStore,
) {
    notes.import_notes(&snapshot.notes);
    tasks.import_tasks(&snapshot.tasks);
    jobs.set_jobs(&snapshot.jobs);
}
