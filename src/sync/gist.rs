use std::collections::HashMap;
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::store::keyed::Storage;

use super::snapshot::Snapshot;

const API_BASE: &str = "https://api.github.com";
const TOKEN_KEY: &str = "daybook.github_token";
const GIST_ID_KEY: &str = "daybook.gist_id";
const GIST_DESCRIPTION: &str = "Daybook data sync";
const USER_AGENT: &str = concat!("daybook/", env!("CARGO_PKG_VERSION"));

/// Name of the single file inside the gist that holds the snapshot.
pub const GIST_FILENAME: &str = "daybook-data.json";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no GitHub token configured")]
    Unauthenticated,
    #[error("no gist bound to this device")]
    NotBound,
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("remote returned {status}: {body}")]
    RemoteStatus { status: StatusCode, body: String },
}

/// Where the client stands relative to the remote gist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    /// No token.
    Disconnected,
    /// Token present, no gist created or linked yet.
    NoDocument,
    /// Token present and pinned to a gist id.
    Bound,
}

/// Client for the GitHub Gist API.
///
/// Mirrors the full snapshot into one private gist. The token and the
/// bound gist id persist through the storage port under fixed keys, so a
/// restarted process picks the binding back up.
pub struct GistClient {
    storage: Arc<dyn Storage>,
    http: Client,
    token: Option<String>,
    gist_id: Option<String>,
}

impl GistClient {
    pub fn new(storage: Arc<dyn Storage>) -> Result<Self, SyncError> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        let token = storage.get(TOKEN_KEY);
        let gist_id = storage.get(GIST_ID_KEY);
        Ok(Self {
            storage,
            http,
            token,
            gist_id,
        })
    }

    pub fn state(&self) -> RemoteState {
        match (&self.token, &self.gist_id) {
            (None, _) => RemoteState::Disconnected,
            (Some(_), None) => RemoteState::NoDocument,
            (Some(_), Some(_)) => RemoteState::Bound,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn gist_id(&self) -> Option<&str> {
        self.gist_id.as_deref()
    }

    /// Stores the credential; validity is only ever checked by
    /// `test_connection`.
    pub fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
        self.storage.set(TOKEN_KEY, token);
    }

    /// Pin this client to an existing gist by id.
    pub fn set_gist_id(&mut self, gist_id: &str) {
        self.gist_id = Some(gist_id.to_string());
        self.storage.set(GIST_ID_KEY, gist_id);
    }

    /// Drops the token and the gist binding, in memory and from storage.
    /// Local notes and tasks are untouched.
    pub fn clear_auth(&mut self) {
        self.token = None;
        self.gist_id = None;
        self.storage.remove(TOKEN_KEY);
        self.storage.remove(GIST_ID_KEY);
    }

    /// Lightweight authenticated probe against the identity endpoint. True
    /// only on an explicit 2xx; every failure cause collapses to false.
    pub async fn test_connection(&self) -> bool {
        let Some(token) = self.token.as_deref() else {
            return false;
        };
        let resp = self
            .http
            .get(format!("{API_BASE}/user"))
            .header("Authorization", format!("token {token}"))
            .send()
            .await;
        match resp {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                log::warn!("Connection probe failed: {}", e);
                false
            }
        }
    }

    /// Creates the private gist holding the snapshot and binds its id.
    pub async fn create_gist(&mut self, snapshot: &Snapshot) -> Result<String, SyncError> {
        let token = self.token.clone().ok_or(SyncError::Unauthenticated)?;
        let body = serde_json::json!({
            "description": GIST_DESCRIPTION,
            "public": false,
            "files": { GIST_FILENAME: { "content": snapshot_content(snapshot) } }
        });
        let resp = self
            .http
            .post(format!("{API_BASE}/gists"))
            .header("Authorization", format!("token {token}"))
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let gist: GistResponse = resp.json().await?;
        log::info!("Created gist {}", gist.id);
        self.set_gist_id(&gist.id);
        Ok(gist.id)
    }

    /// Overwrites the bound gist's snapshot file wholesale.
    pub async fn update_gist(&self, snapshot: &Snapshot) -> Result<(), SyncError> {
        let token = self.token.as_deref().ok_or(SyncError::Unauthenticated)?;
        let gist_id = self.gist_id.as_deref().ok_or(SyncError::NotBound)?;
        let body = serde_json::json!({
            "files": { GIST_FILENAME: { "content": snapshot_content(snapshot) } }
        });
        let resp = self
            .http
            .patch(format!("{API_BASE}/gists/{gist_id}"))
            .header("Authorization", format!("token {token}"))
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    /// Fetches and decodes the bound gist. `Ok(None)` when no token or no
    /// binding is present (no network call is made), and when the gist has
    /// no readable snapshot file. Transport failures and non-2xx responses
    /// are errors.
    pub async fn fetch_gist(&self) -> Result<Option<Snapshot>, SyncError> {
        let (Some(token), Some(gist_id)) = (self.token.as_deref(), self.gist_id.as_deref())
        else {
            return Ok(None);
        };
        let resp = self
            .http
            .get(format!("{API_BASE}/gists/{gist_id}"))
            .header("Authorization", format!("token {token}"))
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let gist: GistResponse = resp.json().await?;
        Ok(extract_snapshot(&gist.files))
    }
}

#[derive(Debug, Deserialize)]
struct GistResponse {
    id: String,
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    content: Option<String>,
}

fn snapshot_content(snapshot: &Snapshot) -> String {
    serde_json::to_string_pretty(snapshot).unwrap_or_else(|e| {
        log::error!("Failed to serialize snapshot: {}", e);
        String::new()
    })
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, SyncError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SyncError::RemoteStatus { status, body })
}

/// Pull the snapshot out of a gist response's file map. A missing file,
/// missing content, or unparsable JSON all degrade to `None`: "nothing to
/// load", not an error.
fn extract_snapshot(files: &HashMap<String, GistFile>) -> Option<Snapshot> {
    let content = files.get(GIST_FILENAME)?.content.as_deref()?;
    match serde_json::from_str(content) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            log::warn!("Gist file {} is not a readable snapshot: {}", GIST_FILENAME, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::keyed::MemoryStorage;
    use std::collections::BTreeMap;

    fn client() -> GistClient {
        GistClient::new(Arc::new(MemoryStorage::new())).unwrap()
    }

    fn sample_snapshot() -> Snapshot {
        Snapshot {
            jobs: vec!["acme".to_string()],
            notes: BTreeMap::new(),
            tasks: BTreeMap::new(),
        }
    }

    #[test]
    fn state_machine_follows_token_and_binding() {
        let mut client = client();
        assert_eq!(client.state(), RemoteState::Disconnected);

        client.set_token("ghp_secret");
        assert_eq!(client.state(), RemoteState::NoDocument);

        client.set_gist_id("abc123");
        assert_eq!(client.state(), RemoteState::Bound);

        client.clear_auth();
        assert_eq!(client.state(), RemoteState::Disconnected);
        assert_eq!(client.token(), None);
        assert_eq!(client.gist_id(), None);
    }

    #[test]
    fn binding_survives_a_new_client_on_the_same_storage() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        {
            let mut client = GistClient::new(Arc::clone(&storage)).unwrap();
            client.set_token("ghp_secret");
            client.set_gist_id("abc123");
        }
        let client = GistClient::new(Arc::clone(&storage)).unwrap();
        assert_eq!(client.state(), RemoteState::Bound);
        assert_eq!(client.gist_id(), Some("abc123"));
    }

    #[test]
    fn clear_auth_wipes_persisted_copies() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut client = GistClient::new(Arc::clone(&storage)).unwrap();
        client.set_token("ghp_secret");
        client.set_gist_id("abc123");
        client.clear_auth();

        let reopened = GistClient::new(storage).unwrap();
        assert_eq!(reopened.state(), RemoteState::Disconnected);
    }

    #[tokio::test]
    async fn fetch_without_binding_short_circuits() {
        let client = client();
        assert!(matches!(client.fetch_gist().await, Ok(None)));
    }

    #[tokio::test]
    async fn fetch_after_clear_auth_short_circuits() {
        let mut client = client();
        client.set_token("ghp_secret");
        client.set_gist_id("abc123");
        client.clear_auth();
        assert!(matches!(client.fetch_gist().await, Ok(None)));
    }

    #[tokio::test]
    async fn fetch_with_token_but_no_binding_short_circuits() {
        let mut client = client();
        client.set_token("ghp_secret");
        assert!(matches!(client.fetch_gist().await, Ok(None)));
    }

    #[tokio::test]
    async fn create_without_token_is_unauthenticated() {
        let mut client = client();
        let err = client.create_gist(&sample_snapshot()).await.unwrap_err();
        assert!(matches!(err, SyncError::Unauthenticated));
    }

    #[tokio::test]
    async fn update_without_binding_is_not_bound() {
        let mut client = client();
        client.set_token("ghp_secret");
        let err = client.update_gist(&sample_snapshot()).await.unwrap_err();
        assert!(matches!(err, SyncError::NotBound));
    }

    #[tokio::test]
    async fn probe_without_token_is_false_without_a_network_call() {
        assert!(!client().test_connection().await);
    }

    #[test]
    fn extract_snapshot_reads_the_expected_file() {
        let snapshot = sample_snapshot();
        let mut files = HashMap::new();
        files.insert(
            GIST_FILENAME.to_string(),
            GistFile {
                content: Some(serde_json::to_string_pretty(&snapshot).unwrap()),
            },
        );
        assert_eq!(extract_snapshot(&files), Some(snapshot));
    }

    #[test]
    fn extract_snapshot_degrades_to_none() {
        // No files at all
        assert_eq!(extract_snapshot(&HashMap::new()), None);

        // Wrong filename
        let mut files = HashMap::new();
        files.insert(
            "something-else.json".to_string(),
            GistFile {
                content: Some("{}".to_string()),
            },
        );
        assert_eq!(extract_snapshot(&files), None);

        // File present but content missing
        let mut files = HashMap::new();
        files.insert(GIST_FILENAME.to_string(), GistFile { content: None });
        assert_eq!(extract_snapshot(&files), None);

        // Content present but malformed
        let mut files = HashMap::new();
        files.insert(
            GIST_FILENAME.to_string(),
            GistFile {
                content: Some("definitely not json".to_string()),
            },
        );
        assert_eq!(extract_snapshot(&files), None);
    }
}
