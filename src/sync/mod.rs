//! Remote sync over a single private GitHub Gist.
//!
//! The snapshot is a whole-state artifact: pushing overwrites the remote
//! wholesale and pulling overwrites local state wholesale, with no diffing
//! or merging. Two devices pushing concurrently are last-write-wins; the
//! later PATCH silently replaces the earlier one.

pub mod gist;
pub mod snapshot;

use crate::store::jobs::JobList;
use crate::store::notes::NotesStore;
use crate::store::tasks::TaskStore;

use gist::{GistClient, RemoteState, SyncError};
use snapshot::{export_snapshot, import_snapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The probe failed; the stored credential was dropped again.
    InvalidToken,
    /// Connected. `loaded` is true when a bound gist was fetched and
    /// imported.
    Connected { loaded: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// First upload: a gist was created and bound.
    Created(String),
    /// The bound gist was overwritten.
    Updated,
}

/// Store the token and probe it. On success, a bound gist is fetched and
/// imported before anything else, so a second device starts from the
/// remote state rather than pushing its own over it.
pub async fn connect(
    client: &mut GistClient,
    token: &str,
    jobs: &JobList,
    notes: &NotesStore,
    tasks: &TaskStore,
) -> Result<ConnectOutcome, SyncError> {
    client.set_token(token);
    if !client.test_connection().await {
        client.clear_auth();
        return Ok(ConnectOutcome::InvalidToken);
    }
    let loaded = match client.fetch_gist().await? {
        Some(snapshot) => {
            import_snapshot(&snapshot, jobs, notes, tasks);
            log::info!("Imported remote snapshot on connect ({} jobs)", snapshot.jobs.len());
            true
        }
        None => false,
    };
    Ok(ConnectOutcome::Connected { loaded })
}

/// Upload the full local state: update the bound gist, or create and bind
/// one on first upload.
pub async fn push(
    client: &mut GistClient,
    jobs: &JobList,
    notes: &NotesStore,
    tasks: &TaskStore,
) -> Result<PushOutcome, SyncError> {
    let snapshot = export_snapshot(jobs, notes, tasks);
    if client.state() == RemoteState::Bound {
        client.update_gist(&snapshot).await?;
        log::info!("Updated remote snapshot ({} jobs)", snapshot.jobs.len());
        Ok(PushOutcome::Updated)
    } else {
        let id = client.create_gist(&snapshot).await?;
        Ok(PushOutcome::Created(id))
    }
}

/// Overwrite local state with the remote snapshot, unconditionally.
/// Returns false when there was nothing to load.
pub async fn pull(
    client: &GistClient,
    jobs: &JobList,
    notes: &NotesStore,
    tasks: &TaskStore,
) -> Result<bool, SyncError> {
    match client.fetch_gist().await? {
        Some(snapshot) => {
            import_snapshot(&snapshot, jobs, notes, tasks);
            log::info!("Imported remote snapshot ({} jobs)", snapshot.jobs.len());
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::keyed::{MemoryStorage, Storage};
    use std::sync::Arc;

    fn stores() -> (Arc<dyn Storage>, JobList, NotesStore, TaskStore) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        (
            Arc::clone(&storage),
            JobList::new(Arc::clone(&storage)),
            NotesStore::new(Arc::clone(&storage)),
            TaskStore::new(Arc::clone(&storage)),
        )
    }

    #[tokio::test]
    async fn pull_without_binding_loads_nothing() {
        let (storage, jobs, notes, tasks) = stores();
        jobs.add("untouched");
        let client = GistClient::new(storage).unwrap();

        let loaded = pull(&client, &jobs, &notes, &tasks).await.unwrap();
        assert!(!loaded);
        assert_eq!(jobs.jobs(), vec!["untouched"]);
    }

    #[tokio::test]
    async fn push_while_disconnected_is_unauthenticated() {
        let (storage, jobs, notes, tasks) = stores();
        let mut client = GistClient::new(storage).unwrap();

        let err = push(&mut client, &jobs, &notes, &tasks).await.unwrap_err();
        assert!(matches!(err, SyncError::Unauthenticated));
    }
}
