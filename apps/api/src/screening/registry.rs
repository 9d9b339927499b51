//! In-memory registry of live screening sessions.
//!
//! The registry lock only guards the id → handle map. Each session sits behind its own
//! async mutex, so sessions never contend with each other and one session's steps run
//! one at a time.
//!
//! Sessions leave the registry on DELETE, on a failed start, or through `evict_expired`:
//! settled (Completed/Failed) sessions after the retention window, live ones after the
//! idle timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::screening::session::ScreeningSession;

/// How often the background sweeper runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct SessionEntry {
    pub session: ScreeningSession,
    /// Key of the persisted record, once written.
    pub stored_key: Option<String>,
    /// When the session reached Completed or Failed.
    pub settled_at: Option<Instant>,
}

impl SessionEntry {
    /// Stamps `settled_at` the first time the session is seen in a terminal state.
    pub fn mark_if_settled(&mut self) {
        if self.session.state().is_terminal() && self.settled_at.is_none() {
            self.settled_at = Some(Instant::now());
        }
    }
}

pub type SessionHandle = Arc<Mutex<SessionEntry>>;

struct Slot {
    handle: SessionHandle,
    last_seen: Instant,
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Slot>>>,
}

impl SessionRegistry {
    pub async fn insert(&self, session: ScreeningSession) -> (Uuid, SessionHandle) {
        let id = session.id();
        let handle = Arc::new(Mutex::new(SessionEntry {
            session,
            stored_key: None,
            settled_at: None,
        }));
        self.sessions.write().await.insert(
            id,
            Slot {
                handle: handle.clone(),
                last_seen: Instant::now(),
            },
        );
        (id, handle)
    }

    /// Looks a session up and counts the lookup as activity.
    pub async fn get(&self, id: Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions.get_mut(&id)?;
        slot.last_seen = Instant::now();
        Some(slot.handle.clone())
    }

    pub async fn remove(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.write().await.remove(&id).map(|slot| slot.handle)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops settled sessions older than `retention` and live sessions idle longer than
    /// `idle_timeout`. Sessions whose lock is held are mid-step and always kept.
    pub async fn evict_expired(&self, retention: Duration, idle_timeout: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|id, slot| {
            let Ok(mut entry) = slot.handle.try_lock() else {
                return true;
            };
            let expired = match entry.settled_at {
                Some(settled_at) => now.duration_since(settled_at) >= retention,
                None => now.duration_since(slot.last_seen) >= idle_timeout,
            };
            if !expired {
                return true;
            }

            if entry.session.record().is_some() && entry.stored_key.is_none() {
                warn!(session_id = %id, "Evicting completed session whose record was never stored");
            }
            entry.session.abandon();
            info!(session_id = %id, status = %entry.session.state().status(), "session evicted");
            false
        });

        before - sessions.len()
    }
}

/// Runs `evict_expired` every `SWEEP_INTERVAL` for the life of the process.
pub fn spawn_sweeper(
    registry: SessionRegistry,
    retention: Duration,
    idle_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let evicted = registry.evict_expired(retention, idle_timeout).await;
            if evicted > 0 {
                info!("Evicted {evicted} screening sessions");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screening::models::ScreeningRequest;

    fn session() -> ScreeningSession {
        ScreeningSession::new(ScreeningRequest {
            job_description: "jd".to_string(),
            resume_text: "cv".to_string(),
        })
    }

    const RETENTION: Duration = Duration::from_secs(600);
    const IDLE: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_insert_get_remove() {
        let registry = SessionRegistry::default();
        let (id, _) = registry.insert(session()).await;
        assert_eq!(registry.len().await, 1);

        let handle = registry.get(id).await.unwrap();
        assert_eq!(handle.lock().await.session.id(), id);

        assert!(registry.remove(id).await.is_some());
        assert!(registry.get(id).await.is_none());
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let registry = SessionRegistry::default();
        let (a, handle_a) = registry.insert(session()).await;
        let (b, _) = registry.insert(session()).await;
        assert_ne!(a, b);

        // Holding one session's lock does not block access to another
        let _guard = handle_a.lock().await;
        let handle_b = registry.get(b).await.unwrap();
        assert!(handle_b.try_lock().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_session_evicted_after_retention() {
        let registry = SessionRegistry::default();
        let (id, handle) = registry.insert(session()).await;
        {
            let mut entry = handle.lock().await;
            entry.session.abandon();
            entry.mark_if_settled();
        }

        tokio::time::advance(RETENTION - Duration::from_secs(1)).await;
        assert_eq!(registry.evict_expired(RETENTION, IDLE).await, 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(registry.evict_expired(RETENTION, IDLE).await, 1);
        assert!(registry.get(id).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_live_session_evicted_and_activity_resets_clock() {
        let registry = SessionRegistry::default();
        let (id, handle) = registry.insert(session()).await;

        tokio::time::advance(IDLE - Duration::from_secs(10)).await;
        registry.get(id).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(registry.evict_expired(RETENTION, IDLE).await, 0);

        tokio::time::advance(IDLE).await;
        assert_eq!(registry.evict_expired(RETENTION, IDLE).await, 1);
        assert_eq!(registry.len().await, 0);
        // The evicted session is closed, not left mid-pipeline
        assert!(handle.lock().await.session.state().is_terminal());
    }

    #[tokio::test]
    async fn test_busy_session_is_kept() {
        let registry = SessionRegistry::default();
        let (_, handle) = registry.insert(session()).await;
        let _guard = handle.lock().await;

        assert_eq!(registry.evict_expired(Duration::ZERO, Duration::ZERO).await, 0);
        assert_eq!(registry.len().await, 1);
    }
}
