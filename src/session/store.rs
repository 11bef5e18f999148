use log::{ debug, info };
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{ Duration, Instant };
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::ChatSession;

const MAX_SESSION_ID_LEN: usize = 64;

pub const DEFAULT_SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Ids come from the browser, so only short alphanumeric/dash strings are kept.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty() &&
        id.len() <= MAX_SESSION_ID_LEN &&
        id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

struct SessionEntry {
    session: Arc<Mutex<ChatSession>>,
    connections: usize,
    last_active: Instant,
}

impl SessionEntry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        self.connections == 0 && now.saturating_duration_since(self.last_active) >= ttl
    }
}

/// In-process registry of live chat sessions.
///
/// A session ends once it has no open connection and has been idle for
/// `idle_ttl`; it is then dropped with its engine and transcript.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_ttl(DEFAULT_SESSION_IDLE_TTL)
    }
}

fn evict_expired(sessions: &mut HashMap<String, SessionEntry>, ttl: Duration) -> usize {
    let now = Instant::now();
    let before = sessions.len();
    sessions.retain(|id, entry| {
        let expired = entry.is_expired(now, ttl);
        if expired {
            debug!("Evicting idle session {}", id);
        }
        !expired
    });
    before - sessions.len()
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), idle_ttl }
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    /// Looks up a live session and counts the lookup as activity.
    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<ChatSession>>> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.get_mut(id)?;
        entry.last_active = Instant::now();
        Some(Arc::clone(&entry.session))
    }

    async fn checkout<F>(
        &self,
        id: Option<&str>,
        make: F,
        connecting: bool
    ) -> (String, Arc<Mutex<ChatSession>>)
        where F: FnOnce(&str) -> ChatSession
    {
        let id = match id {
            Some(id) if is_valid_session_id(id) => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        let mut sessions = self.sessions.lock().await;
        evict_expired(&mut sessions, self.idle_ttl);
        let entry = sessions.entry(id.clone()).or_insert_with(|| SessionEntry {
            session: Arc::new(Mutex::new(make(&id))),
            connections: 0,
            last_active: Instant::now(),
        });
        entry.last_active = Instant::now();
        if connecting {
            entry.connections += 1;
        }
        let session = Arc::clone(&entry.session);
        (id, session)
    }

    /// Returns the session for `id`, creating it with `make` if needed.
    /// A missing or malformed id gets a fresh UUID.
    pub async fn get_or_create<F>(
        &self,
        id: Option<&str>,
        make: F
    ) -> (String, Arc<Mutex<ChatSession>>)
        where F: FnOnce(&str) -> ChatSession
    {
        self.checkout(id, make, false).await
    }

    /// Like [`SessionStore::get_or_create`], and marks one more open
    /// connection. Every `connect` must be paired with a [`SessionStore::disconnect`].
    pub async fn connect<F>(
        &self,
        id: Option<&str>,
        make: F
    ) -> (String, Arc<Mutex<ChatSession>>)
        where F: FnOnce(&str) -> ChatSession
    {
        self.checkout(id, make, true).await
    }

    /// Closes one connection; the idle clock starts when the last one closes.
    pub async fn disconnect(&self, id: &str) {
        if let Some(entry) = self.sessions.lock().await.get_mut(id) {
            entry.connections = entry.connections.saturating_sub(1);
            entry.last_active = Instant::now();
        }
    }

    /// Drops every session with no connection that has been idle past the TTL.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        evict_expired(&mut sessions, self.idle_ttl)
    }

    /// Runs [`SessionStore::evict_idle`] every `every` until the runtime shuts down.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let evicted = store.evict_idle().await;
                if evicted > 0 {
                    info!("Evicted {} idle session(s), {} remaining", evicted, store.len().await);
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
