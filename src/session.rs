use std::collections::BTreeMap;
use std::fmt::Debug;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Key the bearer token is stored under.
pub const TOKEN_KEY: &str = "xbytechat_token";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session store at {path} is not a JSON object: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode session store: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Small persistent key/value storage for the session.
pub trait TokenStore: Send + Sync + Debug {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn save(&self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// JSON object on disk. Writes go through a temp file in the same directory
/// and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, SessionError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|source| SessionError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), SessionError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(serde_json::to_string_pretty(entries)?.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| SessionError::Io(e.error))?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.read_all()?.remove(key))
    }

    fn save(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: DashMap<String, String>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    fn save(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    LoggedOut,
    /// The server rejected the token; the user has to log in again.
    LoginRequired,
}

/// The authenticated context handed to the HTTP layer.
#[derive(Debug)]
pub struct Session {
    store: Arc<dyn TokenStore>,
    token: RwLock<Option<String>>,
    in_auth_flow: AtomicBool,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    /// Opens the session, picking up a token persisted by an earlier run.
    pub fn open(store: Arc<dyn TokenStore>) -> Result<Arc<Self>, SessionError> {
        let token = store.load(TOKEN_KEY)?.filter(|t| !t.is_empty());
        debug!(authenticated = token.is_some(), "session opened");
        let (events, _) = broadcast::channel(16);
        Ok(Arc::new(Self {
            store,
            token: RwLock::new(token),
            in_auth_flow: AtomicBool::new(false),
            events,
        }))
    }

    pub fn in_memory() -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            store: Arc::new(MemoryTokenStore::new()),
            token: RwLock::new(None),
            in_auth_flow: AtomicBool::new(false),
            events,
        })
    }

    pub fn token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn set_token(&self, token: &str) -> Result<(), SessionError> {
        self.store.save(TOKEN_KEY, token)?;
        self.replace(Some(token.to_string()));
        info!("session token stored");
        self.publish(SessionEvent::LoggedIn);
        Ok(())
    }

    /// Forgets the token locally and in the store.
    pub fn clear_token(&self) -> Result<(), SessionError> {
        let had_token = self.token().is_some();
        self.replace(None);
        self.store.remove(TOKEN_KEY)?;
        if had_token {
            info!("session token cleared");
        }
        Ok(())
    }

    pub fn logout(&self) -> Result<(), SessionError> {
        self.clear_token()?;
        self.publish(SessionEvent::LoggedOut);
        Ok(())
    }

    /// Marks the session as being on the login screens until the guard drops.
    /// 401s seen meanwhile do not ask for another login.
    pub fn begin_auth_flow(self: &Arc<Self>) -> AuthFlowGuard {
        self.in_auth_flow.store(true, Ordering::SeqCst);
        AuthFlowGuard {
            session: self.clone(),
        }
    }

    pub fn in_auth_flow(&self) -> bool {
        self.in_auth_flow.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn request_login(&self) {
        warn!("login required");
        self.publish(SessionEvent::LoginRequired);
    }

    fn publish(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn replace(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }
}

#[must_use = "the auth flow ends when the guard is dropped"]
#[derive(Debug)]
pub struct AuthFlowGuard {
    session: Arc<Session>,
}

impl Drop for AuthFlowGuard {
    fn drop(&mut self) {
        self.session.in_auth_flow.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_roundtrip_and_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("state").join("session.json"));

        assert_eq!(store.load(TOKEN_KEY).unwrap(), None);
        store.save(TOKEN_KEY, "abc").unwrap();
        store.save("other", "keep").unwrap();
        assert_eq!(store.load(TOKEN_KEY).unwrap(), Some("abc".into()));

        store.remove(TOKEN_KEY).unwrap();
        assert_eq!(store.load(TOKEN_KEY).unwrap(), None);
        assert_eq!(store.load("other").unwrap(), Some("keep".into()));
    }

    #[test]
    fn test_file_store_reports_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "[1,2,3]").unwrap();
        let store = FileTokenStore::new(&path);
        assert!(matches!(store.load(TOKEN_KEY), Err(SessionError::Corrupt { .. })));
    }

    #[test]
    fn test_session_picks_up_persisted_token() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let first = Session::open(Arc::new(FileTokenStore::new(&path))).unwrap();
        first.set_token("t-1").unwrap();

        let second = Session::open(Arc::new(FileTokenStore::new(&path))).unwrap();
        assert_eq!(second.token().as_deref(), Some("t-1"));

        second.clear_token().unwrap();
        let third = Session::open(Arc::new(FileTokenStore::new(&path))).unwrap();
        assert!(!third.is_authenticated());
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let session = Session::in_memory();
        let mut rx = session.subscribe();
        session.set_token("x").unwrap();
        session.request_login();
        session.logout().unwrap();

        assert_eq!(rx.recv().await.unwrap(), SessionEvent::LoggedIn);
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::LoginRequired);
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::LoggedOut);
    }

    #[test]
    fn test_auth_flow_guard_resets_on_drop() {
        let session = Session::in_memory();
        {
            let _guard = session.begin_auth_flow();
            assert!(session.in_auth_flow());
        }
        assert!(!session.in_auth_flow());
    }
}
