use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::{error::SkinCheckError, yolo::DetectionRecord};

pub const SESSION_COOKIE: &str = "skincheck_session";
const SESSION_ID_LEN: usize = 32;

/// What one client carries from the upload step to the result step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub image_path: Option<String>,
    #[serde(default)]
    pub results: Vec<DetectionRecord>,
    /// One-shot message for the next rendered page.
    #[serde(default)]
    pub flash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let id: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_ID_LEN)
            .map(char::from)
            .collect();
        SessionId(id)
    }

    /// Accepts only ids shaped like the ones [`SessionId::generate`] makes.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() == SESSION_ID_LEN && raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            Some(SessionId(raw.to_owned()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Finds the session cookie in a `Cookie` request header value.
    pub fn from_cookie_header(header: &str) -> Option<Self> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .and_then(|(_, value)| SessionId::parse(value.trim()))
    }

    pub fn set_cookie_value(&self) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, self.0
        )
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // enough to correlate log lines without leaking the cookie
        write!(f, "{}…", &self.0[..6])
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionState>, SkinCheckError>;

    async fn save(&self, id: &SessionId, state: &SessionState) -> Result<(), SkinCheckError>;

    /// Removes and returns the pending flash message, if any.
    async fn take_flash(&self, id: &SessionId) -> Result<Option<String>, SkinCheckError> {
        let Some(mut state) = self.load(id).await? else {
            return Ok(None);
        };
        let flash = state.flash.take();
        if flash.is_some() {
            self.save(id, &state).await?;
        }
        Ok(flash)
    }
}

/// Process-local store. Each session is held as its JSON document, the same
/// shape any external store would persist.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionState>, SkinCheckError> {
        let sessions = self.sessions.read().await;
        match sessions.get(id) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, id: &SessionId, state: &SessionState) -> Result<(), SkinCheckError> {
        let json = serde_json::to_string(state)?;
        self.sessions.write().await.insert(id.clone(), json);
        Ok(())
    }

    /// Read, clear and write back under one write guard, so a concurrent
    /// upload's save is never overwritten with the older document.
    async fn take_flash(&self, id: &SessionId) -> Result<Option<String>, SkinCheckError> {
        let mut sessions = self.sessions.write().await;
        let Some(json) = sessions.get_mut(id) else {
            return Ok(None);
        };
        let mut state: SessionState = serde_json::from_str(json)?;
        let flash = state.flash.take();
        if flash.is_some() {
            *json = serde_json::to_string(&state)?;
        }
        Ok(flash)
    }
}
