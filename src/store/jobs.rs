use std::sync::Arc;

use super::keyed::{Storage, is_valid_job_id, record_parse_failure};

const JOBS_KEY: &str = "daybook.jobs";

/// The configured job list, stored as one document under a fixed key.
///
/// Removing a job leaves its note and task documents in place; the export
/// scan still finds them until an import overwrites local state.
pub struct JobList {
    storage: Arc<dyn Storage>,
}

impl JobList {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn jobs(&self) -> Vec<String> {
        let Some(raw) = self.storage.get(JOBS_KEY) else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(jobs) => jobs,
            Err(e) => {
                record_parse_failure();
                log::warn!("Discarding unreadable document {}: {}", JOBS_KEY, e);
                Vec::new()
            }
        }
    }

    pub fn set_jobs(&self, jobs: &[String]) {
        match serde_json::to_string(jobs) {
            Ok(raw) => self.storage.set(JOBS_KEY, &raw),
            Err(e) => log::error!("Failed to serialize {}: {}", JOBS_KEY, e),
        }
    }

    /// Adds a job name (trimmed). Returns false for an invalid name or a
    /// duplicate.
    pub fn add(&self, name: &str) -> bool {
        let name = name.trim();
        if !is_valid_job_id(name) {
            return false;
        }
        let mut jobs = self.jobs();
        if jobs.iter().any(|j| j == name) {
            return false;
        }
        jobs.push(name.to_string());
        self.set_jobs(&jobs);
        true
    }

    pub fn remove(&self, name: &str) {
        let mut jobs = self.jobs();
        let before = jobs.len();
        jobs.retain(|j| j != name);
        if jobs.len() != before {
            self.set_jobs(&jobs);
        }
    }
}
