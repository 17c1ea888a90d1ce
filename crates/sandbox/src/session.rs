//! Container-backed session store (C6): creation, TTL refresh, the
//! busy/pending-execution guard that serializes access to a single
//! container, and the background reaper.
//!
//! Grounded on `original_source/app/services/ptc/sandbox.py`'s
//! `SandboxSession` dataclass and `SandboxSessionManager.{create_session,
//! get_session, close_session, _cleanup_expired_sessions}`.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::{
    driver::{self, ContainerHandle, SandboxLimits},
    error::Result,
    protocol,
};

/// Which embedded runner a store's containers run, and therefore which
/// protocol version gates compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerKind {
    Ptc,
    Standalone,
}

impl RunnerKind {
    fn version(self) -> u32 {
        match self {
            Self::Ptc => protocol::PTC_RUNNER_VERSION,
            Self::Standalone => protocol::STANDALONE_RUNNER_VERSION,
        }
    }

    fn ready_marker(self) -> &'static str {
        match self {
            Self::Ptc => protocol::PTC_READY,
            Self::Standalone => protocol::STANDALONE_READY,
        }
    }
}

/// State kept between HTTP calls while a PTC `execute_code` invocation is
/// suspended waiting for a `tool_result`. See §3 "Pending execution state".
#[derive(Debug, Clone)]
pub struct PendingExecution {
    pub server_tool_use_id: String,
    pub code: String,
    pub pending_call_ids: Vec<String>,
    pub tool_calls_count: u32,
}

/// A live session handed out to callers. Cloning is cheap; the container
/// itself is behind an `Arc<Mutex<_>>` so concurrent holders serialize on the
/// actual I/O rather than racing.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: String,
    pub container: Arc<Mutex<ContainerHandle>>,
    pub tools: Arc<Vec<Value>>,
}

struct SessionEntry {
    handle: SessionHandle,
    expires_at: OffsetDateTime,
    last_used_at: OffsetDateTime,
    execution_count: u32,
    is_busy: bool,
    pending: Option<PendingExecution>,
    runner_version: u32,
}

impl SessionEntry {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }

    fn is_incompatible(&self, current_version: u32) -> bool {
        self.runner_version != current_version
    }
}

/// Process-wide registry of sandbox sessions, guarded by a single mutex.
///
/// Per §5, per-session flags (`is_busy`, `pending`) are mutated only while
/// holding this mutex; no sandbox I/O await ever happens while the lock is
/// held — callers clone out the `Arc<Mutex<ContainerHandle>>` and release the
/// map lock before talking to the container.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    docker: tokio::sync::OnceCell<bollard::Docker>,
    kind: RunnerKind,
    limits: SessionLimits,
    session_timeout: Duration,
}

/// Per-container resource limits and image, independent of which of PTC's or
/// standalone's config section they were read from. Both `PtcService` and
/// `CodeExecService` build one of these from their own config struct and
/// hand it to [`SessionStore::new`]; the store itself doesn't care which
/// beta feature a session belongs to.
#[derive(Debug, Clone)]
pub struct SessionLimits {
    pub image: String,
    pub memory_limit: String,
    pub cpu_quota: i64,
    pub cpu_period: i64,
    pub network_disabled: bool,
    pub session_timeout_seconds: u64,
}

impl SessionStore {
    pub fn new(kind: RunnerKind, limits: SessionLimits) -> Arc<Self> {
        let session_timeout = Duration::from_secs(limits.session_timeout_seconds);
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            docker: tokio::sync::OnceCell::new(),
            kind,
            limits,
            session_timeout,
        })
    }

    async fn docker(&self) -> Result<&bollard::Docker> {
        self.docker.get_or_try_init(driver::connect).await
    }

    /// Whether the Docker daemon backing this store can currently be
    /// reached. Used by the PTC/standalone request path (fails fast rather
    /// than creating a session that can never start a container) and by the
    /// `/ready` health check.
    pub async fn docker_available(&self) -> bool {
        self.docker().await.is_ok()
    }

    /// Creates a new container-backed session and registers it. `runner_script`
    /// is the fully-rendered Python program for the given `tools` list.
    pub async fn create(&self, tools: Vec<Value>, runner_script: String) -> Result<SessionHandle> {
        let docker = self.docker().await?;

        let limits = SandboxLimits {
            image: self.limits.image.clone(),
            memory_limit: self.limits.memory_limit.clone(),
            cpu_quota: self.limits.cpu_quota,
            cpu_period: self.limits.cpu_period,
            network_disabled: self.limits.network_disabled,
            working_dir: "/workspace".to_string(),
        };

        let container = driver::create_container(docker, &limits, &runner_script, self.kind.ready_marker()).await?;
        let id = format!("container_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);

        let handle = SessionHandle {
            id: id.clone(),
            container: Arc::new(Mutex::new(container)),
            tools: Arc::new(tools),
        };

        let now = OffsetDateTime::now_utc();
        let entry = SessionEntry {
            handle: handle.clone(),
            expires_at: now + self.session_timeout,
            last_used_at: now,
            execution_count: 0,
            is_busy: false,
            pending: None,
            runner_version: self.kind.version(),
        };

        self.sessions.lock().await.insert(id, entry);

        Ok(handle)
    }

    /// Returns the session if present, unexpired, and compatible. Schedules
    /// an asynchronous close for expired/incompatible entries rather than
    /// ever surfacing them to a caller.
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock().await;

        let stale = sessions
            .get(id)
            .is_some_and(|entry| entry.is_expired(now) || entry.is_incompatible(self.kind.version()));

        if stale {
            if let Some(entry) = sessions.remove(id) {
                let container = entry.handle.container;
                tokio::spawn(async move {
                    let owned = Arc::try_unwrap(container).map(Mutex::into_inner);
                    if let Ok(container) = owned {
                        container.close().await;
                    }
                });
            }
            return None;
        }

        sessions.get(id).map(|entry| entry.handle.clone())
    }

    /// Attempts to take exclusive ownership of a session for a new
    /// `execute_code` invocation. Returns `None` if the session is missing,
    /// expired, incompatible, or already busy — in every case the caller's
    /// next step is to create a fresh session, never to surface an error.
    pub async fn acquire(&self, id: &str) -> Option<SessionHandle> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock().await;

        let entry = sessions.get_mut(id)?;

        if entry.is_expired(now) || entry.is_incompatible(self.kind.version()) || entry.is_busy {
            return None;
        }

        entry.is_busy = true;
        entry.execution_count += 1;
        entry.last_used_at = now;
        entry.expires_at = now + self.session_timeout;

        Some(entry.handle.clone())
    }

    /// Releases the busy flag acquired by [`Self::acquire`], refreshing the
    /// expiry once more so a long-running execution doesn't get reaped out
    /// from under a result that arrives just after the timeout window.
    pub async fn release(&self, id: &str) {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock().await;

        if let Some(entry) = sessions.get_mut(id) {
            entry.is_busy = false;
            entry.last_used_at = now;
            entry.expires_at = now + self.session_timeout;
        }
    }

    pub async fn set_pending(&self, id: &str, pending: PendingExecution) {
        if let Some(entry) = self.sessions.lock().await.get_mut(id) {
            entry.pending = Some(pending);
        }
    }

    pub async fn take_pending(&self, id: &str) -> Option<PendingExecution> {
        self.sessions.lock().await.get_mut(id).and_then(|entry| entry.pending.take())
    }

    pub async fn execution_count(&self, id: &str) -> Option<u32> {
        self.sessions.lock().await.get(id).map(|entry| entry.execution_count)
    }

    pub async fn expires_at(&self, id: &str) -> Option<OffsetDateTime> {
        self.sessions.lock().await.get(id).map(|entry| entry.expires_at)
    }

    /// Sends `__EXIT_SESSION__`, stops and removes the container, and drops
    /// the entry. Best-effort: a container that is already gone is not an error.
    pub async fn close(&self, id: &str) -> bool {
        let Some(entry) = self.sessions.lock().await.remove(id) else {
            return false;
        };

        match Arc::try_unwrap(entry.handle.container) {
            Ok(mutex) => {
                mutex.into_inner().close().await;
            }
            Err(shared) => {
                // Another holder is still mid-execution; close once it's free.
                let mut container = shared.lock().await;
                let exit = format!("{}\n", protocol::EXIT_SESSION);
                let _ = container.send(&exit).await;
            }
        }

        true
    }

    pub async fn close_all(&self) {
        let ids: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        for id in ids {
            self.close(&id).await;
        }
    }

    /// Snapshot of currently-live (unexpired) session ids.
    pub async fn active_sessions(&self) -> Vec<String> {
        let now = OffsetDateTime::now_utc();
        self.sessions
            .lock()
            .await
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Runs forever, scanning for and closing expired sessions every
    /// `cleanup_interval`. Intended to be spawned once per process.
    pub async fn run_reaper(self: Arc<Self>, cleanup_interval: Duration) {
        let mut ticker = tokio::time::interval(cleanup_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let now = OffsetDateTime::now_utc();
            let expired: Vec<String> = {
                let sessions = self.sessions.lock().await;
                sessions
                    .iter()
                    .filter(|(_, entry)| entry.is_expired(now))
                    .map(|(id, _)| id.clone())
                    .collect()
            };

            for id in expired {
                log::debug!(target: "sandbox::session", "reaping expired session {id}");
                self.close(&id).await;
            }
        }
    }
}

/// RFC 3339 rendering used for the `container.expires_at` field surfaced to
/// clients.
pub fn format_expires_at(at: OffsetDateTime) -> String {
    at.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| at.to_string())
}

impl SessionHandle {
    pub async fn send_code(&self, code: &str) -> Result<()> {
        self.container.lock().await.send_code(code).await
    }

    pub async fn send_tool_result(&self, call_id: &str, result: Option<Value>, error: Option<String>) -> Result<()> {
        self.container.lock().await.send_tool_result(call_id, result, error).await
    }

    pub async fn send_standalone_command(&self, kind: &str, input: Value) -> Result<()> {
        self.container.lock().await.send_standalone_command(kind, input).await
    }

    pub async fn read_line(&self, timeout: Duration) -> Result<Option<String>> {
        self.container.lock().await.read_line(timeout).await
    }
}
