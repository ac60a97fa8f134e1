//! Seams between the bridge and the contexts around it.
//!
//! The bridge never touches a browser API directly. The frame, the
//! background coordinator, and persistent storage are each reached through a
//! trait so the same bridge runs inside an extension shell, a stdio host, or
//! a test.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use envelope::Session;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::BridgeError;
use crate::pending::RequestId;
use crate::protocol::FrameCommand;

/// Unsolicited notifications forwarded to the background coordinator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinatorEvent {
    LoginCompleted { session: Session },
    LogoutCompleted,
}

/// Posts messages into the embedded frame.
#[async_trait]
pub trait FramePort: Send + Sync {
    async fn post(&self, request_id: RequestId, command: &FrameCommand) -> Result<(), BridgeError>;
}

/// Delivers notifications to the background coordinator.
#[async_trait]
pub trait CoordinatorPort: Send + Sync {
    async fn notify(&self, event: CoordinatorEvent);
}

/// Persistent local storage holding the last known session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Session>, BridgeError>;
    async fn save(&self, key: &str, session: &Session) -> Result<(), BridgeError>;
    async fn clear(&self, key: &str) -> Result<(), BridgeError>;
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, e.g. with a session persisted by a previous run.
    #[must_use]
    pub fn with_session(key: &str, session: Session) -> Self {
        let mut sessions = HashMap::new();
        sessions.insert(key.to_owned(), session);
        Self { sessions: Mutex::new(sessions) }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, key: &str) -> Result<Option<Session>, BridgeError> {
        Ok(self.sessions.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, session: &Session) -> Result<(), BridgeError> {
        self.sessions
            .lock()
            .await
            .insert(key.to_owned(), session.clone());
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), BridgeError> {
        self.sessions.lock().await.remove(key);
        Ok(())
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

/// JSON file mapping storage keys to sessions.
pub struct FileSessionStore {
    path: PathBuf,
    io: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), io: Mutex::new(()) }
    }

    async fn read_all(&self) -> Result<HashMap<String, Session>, BridgeError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| BridgeError::Storage(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(BridgeError::Storage(e.to_string())),
        }
    }

    async fn write_all(&self, sessions: &HashMap<String, Session>) -> Result<(), BridgeError> {
        let bytes = serde_json::to_vec_pretty(sessions).map_err(|e| BridgeError::Storage(e.to_string()))?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| BridgeError::Storage(e.to_string()))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, key: &str) -> Result<Option<Session>, BridgeError> {
        let _io = self.io.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn save(&self, key: &str, session: &Session) -> Result<(), BridgeError> {
        let _io = self.io.lock().await;
        let mut sessions = self.read_all().await?;
        sessions.insert(key.to_owned(), session.clone());
        self.write_all(&sessions).await
    }

    async fn clear(&self, key: &str) -> Result<(), BridgeError> {
        let _io = self.io.lock().await;
        let mut sessions = self.read_all().await?;
        if sessions.remove(key).is_some() {
            self.write_all(&sessions).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "ports_test.rs"]
mod tests;
