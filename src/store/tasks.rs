use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::core::task::Task;

use super::keyed::{KeyedStore, Storage};

const TASKS_PREFIX: &str = "daybook.tasks.";

/// Per-job task lists, kept in creation order. There is no reordering
/// operation.
pub struct TaskStore {
    records: KeyedStore<Vec<Task>>,
}

impl TaskStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            records: KeyedStore::new(storage, TASKS_PREFIX),
        }
    }

    pub fn get_tasks(&self, job: &str) -> Vec<Task> {
        self.records.load(job)
    }

    pub fn get_task(&self, job: &str, task_id: Uuid) -> Option<Task> {
        self.records
            .load(job)
            .into_iter()
            .find(|t| t.id == task_id)
    }

    /// Appends a new task with the title stored trimmed. Returns `None`
    /// without storing anything when the title is empty after trimming.
    pub fn add_task(
        &self,
        job: &str,
        title: &str,
        description: &str,
        deadline: Option<NaiveDate>,
    ) -> Option<Task> {
        let title = title.trim();
        if title.is_empty() {
            return None;
        }
        let mut tasks = self.records.load(job);
        let mut task = Task::new(title);
        task.description = description.to_string();
        task.deadline = deadline;
        tasks.push(task.clone());
        self.records.save(job, &tasks);
        Some(task)
    }

    /// Flips completion state; no-op if the id is unknown.
    pub fn toggle_task(&self, job: &str, task_id: Uuid) {
        let mut tasks = self.records.load(job);
        if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
            task.toggle();
            self.records.save(job, &tasks);
        }
    }

    /// Replaces title, description and deadline; completion state is left
    /// alone. Passing `deadline: None` clears a stored deadline rather than
    /// preserving it. No-op if the id is unknown or the new title is empty
    /// after trimming.
    pub fn update_task(
        &self,
        job: &str,
        task_id: Uuid,
        title: &str,
        description: &str,
        deadline: Option<NaiveDate>,
    ) {
        let title = title.trim();
        if title.is_empty() {
            return;
        }
        let mut tasks = self.records.load(job);
        if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
            task.title = title.to_string();
            task.description = description.to_string();
            task.deadline = deadline;
            self.records.save(job, &tasks);
        }
    }

    /// Removes the task; removing an unknown id is a no-op.
    pub fn delete_task(&self, job: &str, task_id: Uuid) {
        let mut tasks = self.records.load(job);
        let before = tasks.len();
        tasks.retain(|t| t.id != task_id);
        if tasks.len() != before {
            self.records.save(job, &tasks);
        }
    }

    pub fn get_completed_tasks(&self, job: &str) -> Vec<Task> {
        self.records
            .load(job)
            .into_iter()
            .filter(|t| t.completed)
            .collect()
    }

    pub fn get_pending_tasks(&self, job: &str) -> Vec<Task> {
        self.records
            .load(job)
            .into_iter()
            .filter(|t| !t.completed)
            .collect()
    }

    /// Every job that has at least one task, for export.
    pub fn get_all_tasks(&self) -> BTreeMap<String, Vec<Task>> {
        let mut all = BTreeMap::new();
        for job in self.records.jobs_with_documents() {
            let tasks = self.records.load(&job);
            if !tasks.is_empty() {
                all.insert(job, tasks);
            }
        }
        all
    }

    /// Replace all task lists across all jobs. Jobs absent from the input
    /// end up with no tasks.
    pub fn import_tasks(&self, tasks: &BTreeMap<String, Vec<Task>>) {
        for job in self.records.jobs_with_documents() {
            self.records.remove(&job);
        }
        for (job, list) in tasks {
            self.records.save(job, list);
        }
    }
}
