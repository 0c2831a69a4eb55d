use crate::core::clock::{Clock, SystemClock};
use crate::core::file::get_mime_type;
use crate::core::session::{ROOT_SLOT, Session};
use crate::core::slug::SlugGenerator;
use crate::error::SessionCreateError;
use crate::loader::{InMemoryLoader, PayloadLoader};
use crate::protocol::{RELEASE_DELAY, SWEEP_INTERVAL};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// How many times a session may be downloaded
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConsumptionPolicy {
    /// Any number of downloads until the session expires
    #[default]
    MultiUse,
    /// The first download invalidates the session
    SingleUse,
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub policy: ConsumptionPolicy,
    pub sweep_interval: Duration,
    /// Delay between a download starting and the session being reaped
    pub release_delay: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            policy: ConsumptionPolicy::default(),
            sweep_interval: SWEEP_INTERVAL,
            release_delay: RELEASE_DELAY,
        }
    }
}

/// What the store knows about an identifier right now
#[derive(Clone, Debug)]
pub enum SessionStatus {
    Missing,
    Expired,
    Live(Session),
}

struct StoreState {
    sessions: HashMap<String, Session>,
    slugs: SlugGenerator,
    /// Root slot claimed by a create that is still loading
    root_reserved: bool,
    sweeper: Option<AbortHandle>,
    timers: HashMap<u64, AbortHandle>,
    next_timer_id: u64,
}

impl StoreState {
    fn remove(&mut self, id: &str) -> Option<Session> {
        let session = self.sessions.remove(id)?;
        self.slugs.release(id);
        tracing::info!("Session deleted: {}", display_id(id));
        Some(session)
    }
}

/// Identifier held by a create whose payload is still loading
///
/// Settled under the state lock once loading ends; dropped unsettled (the
/// create future was cancelled) it gives the identifier back.
struct PendingCreate<'a> {
    inner: &'a Inner,
    id: String,
    armed: bool,
}

impl<'a> PendingCreate<'a> {
    fn new(inner: &'a Inner, id: String) -> Self {
        Self {
            inner,
            id,
            armed: true,
        }
    }

    /// `keep` leaves the slug allocated for the session about to be inserted
    fn settle(mut self, state: &mut StoreState, keep: bool) {
        self.armed = false;
        release_claim(state, &self.id, keep);
    }
}

impl Drop for PendingCreate<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("Create for {} cancelled", display_id(&self.id));
            release_claim(&mut self.inner.state.lock(), &self.id, false);
        }
    }
}

fn release_claim(state: &mut StoreState, id: &str, keep: bool) {
    if id == ROOT_SLOT {
        state.root_reserved = false;
    } else if !keep {
        state.slugs.release(id);
    }
}

struct Inner {
    state: Mutex<StoreState>,
    loader: Arc<dyn PayloadLoader>,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
}

impl Inner {
    fn is_dead(&self, session: &Session, now: DateTime<Utc>) -> bool {
        session.is_expired_at(now)
            || (self.config.policy == ConsumptionPolicy::SingleUse && session.consumed)
    }

    fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let dead: Vec<String> = state
            .sessions
            .iter()
            .filter(|(_, session)| self.is_dead(session, now))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &dead {
            state.remove(id);
        }

        if !dead.is_empty() {
            tracing::debug!("Cleaned up {} expired sessions", dead.len());
        }
        dead.len()
    }

    fn finish_release(&self, timer_id: u64, id: &str) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.timers.remove(&timer_id);

        let dead = state
            .sessions
            .get(id)
            .is_some_and(|session| self.is_dead(session, now));
        if dead {
            state.remove(id);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(sweeper) = state.sweeper.take() {
            sweeper.abort();
        }
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
    }
}

/// In-memory registry of live sessions
///
/// Cloning gives another handle to the same store. Creating a store inside
/// a tokio runtime starts the periodic sweep; consuming a session schedules
/// a deferred reap. [`cleanup`](Self::cleanup) cancels all of it.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_parts(Arc::new(InMemoryLoader::new()), Arc::new(SystemClock), config)
    }

    pub fn with_parts(
        loader: Arc<dyn PayloadLoader>,
        clock: Arc<dyn Clock>,
        config: StoreConfig,
    ) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(StoreState {
                sessions: HashMap::new(),
                slugs: SlugGenerator::new(),
                root_reserved: false,
                sweeper: None,
                timers: HashMap::new(),
                next_timer_id: 0,
            }),
            loader,
            clock,
            config,
        });

        let sweeper = spawn_sweeper(&inner);
        inner.state.lock().sweeper = sweeper;

        Self { inner }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Load `path` and register it under a fresh identifier
    ///
    /// With `use_root_slot` the session is stored under the empty identifier
    /// instead, which fails while another live session holds it.
    pub async fn create_session(
        &self,
        path: &Path,
        duration: Duration,
        use_root_slot: bool,
    ) -> Result<Session, SessionCreateError> {
        let now = self.now();
        let expires_at = expiry(now, duration)?;

        let claim = {
            let mut state = self.inner.state.lock();
            if use_root_slot {
                let root_live = state
                    .sessions
                    .get(ROOT_SLOT)
                    .is_some_and(|session| !self.inner.is_dead(session, now));
                if root_live || state.root_reserved {
                    return Err(SessionCreateError::RootSlotTaken);
                }
                state.root_reserved = true;
                PendingCreate::new(&self.inner, ROOT_SLOT.to_string())
            } else {
                let id = state.slugs.generate();
                PendingCreate::new(&self.inner, id)
            }
        };
        let id = claim.id.clone();

        tracing::debug!("Creating session with slug: {}", display_id(&id));

        // if this future is dropped here, `claim` hands the identifier back
        let loaded = self.inner.loader.load(path, &id, expires_at).await;

        let mut state = self.inner.state.lock();
        match loaded {
            Ok(mut session) => {
                claim.settle(&mut state, true);
                session.created_at = now;
                state.sessions.insert(id.clone(), session.clone());
                tracing::info!(
                    "Session created: {} (expires: {})",
                    display_id(&id),
                    expires_at.to_rfc3339()
                );
                Ok(session)
            }
            Err(e) => {
                claim.settle(&mut state, false);
                Err(e.into())
            }
        }
    }

    /// Register bytes that are already in memory, e.g. a finished upload
    pub fn create_upload_session(
        &self,
        file_name: &str,
        payload: Bytes,
        duration: Duration,
    ) -> Result<Session, SessionCreateError> {
        let now = self.now();
        let expires_at = expiry(now, duration)?;
        let mime_type = get_mime_type(file_name);

        let mut state = self.inner.state.lock();
        let id = state.slugs.generate();
        let mut session = Session::new(id.clone(), file_name, mime_type, payload, expires_at);
        session.created_at = now;
        state.sessions.insert(id.clone(), session.clone());

        tracing::info!(
            "Upload session created: {} for {} (expires: {})",
            id,
            file_name,
            expires_at.to_rfc3339()
        );
        Ok(session)
    }

    /// The session behind `id`, if it can still be downloaded
    pub fn get_session(&self, id: &str) -> Option<Session> {
        let now = self.now();
        let state = self.inner.state.lock();
        state
            .sessions
            .get(id)
            .filter(|session| !self.inner.is_dead(session, now))
            .cloned()
    }

    /// Like [`get_session`](Self::get_session) but tells expired apart from missing
    pub fn lookup(&self, id: &str) -> SessionStatus {
        let now = self.now();
        let state = self.inner.state.lock();
        match state.sessions.get(id) {
            None => SessionStatus::Missing,
            Some(session)
                if self.inner.config.policy == ConsumptionPolicy::SingleUse
                    && session.consumed =>
            {
                SessionStatus::Missing
            }
            Some(session) if session.is_expired_at(now) => SessionStatus::Expired,
            Some(session) => SessionStatus::Live(session.clone()),
        }
    }

    /// Count a download and schedule the session's deferred reap
    ///
    /// Under [`ConsumptionPolicy::SingleUse`] the session is marked consumed
    /// and removed once the delay passes. Under `MultiUse` the reap only
    /// removes it if it has expired by then.
    pub fn consume_session(&self, id: &str) -> Option<Session> {
        let now = self.now();
        let mut state = self.inner.state.lock();

        let session = state.sessions.get_mut(id)?;
        if self.inner.is_dead(session, now) {
            return None;
        }

        session.download_count += 1;
        if self.inner.config.policy == ConsumptionPolicy::SingleUse {
            session.consumed = true;
        }
        let updated = session.clone();

        tracing::info!(
            "Session consumed: {} (downloads: {})",
            display_id(id),
            updated.download_count
        );

        self.schedule_release(&mut state, id);
        Some(updated)
    }

    /// Strictly past the deadline; equality is still live
    pub fn is_expired(&self, session: &Session) -> bool {
        session.is_expired_at(self.now())
    }

    /// Remove every dead session now, returning how many went
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }

    /// Cancel all timers and drop every session
    pub fn cleanup(&self) {
        let mut state = self.inner.state.lock();

        if let Some(sweeper) = state.sweeper.take() {
            sweeper.abort();
        }
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }

        let removed = state.sessions.len();
        state.sessions.clear();
        state.slugs.clear();
        state.root_reserved = false;

        tracing::info!("Session store cleaned up ({} sessions removed)", removed);
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deferred reaps still waiting to fire
    pub fn pending_timers(&self) -> usize {
        self.inner.state.lock().timers.len()
    }

    pub fn is_sweeping(&self) -> bool {
        self.inner.state.lock().sweeper.is_some()
    }

    #[cfg(test)]
    pub(crate) fn insert(&self, session: Session) {
        let mut state = self.inner.state.lock();
        state.sessions.insert(session.id.clone(), session);
    }

    fn schedule_release(&self, state: &mut StoreState, id: &str) {
        let Ok(handle) = Handle::try_current() else {
            tracing::debug!("No runtime, skipping deferred release of {}", display_id(id));
            return;
        };

        let timer_id = state.next_timer_id;
        state.next_timer_id += 1;

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let delay = self.inner.config.release_delay;
        let id = id.to_string();

        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.finish_release(timer_id, &id);
            }
        });
        state.timers.insert(timer_id, task.abort_handle());
    }
}

fn spawn_sweeper(inner: &Arc<Inner>) -> Option<AbortHandle> {
    let handle = Handle::try_current().ok()?;
    let weak = Arc::downgrade(inner);
    let period = inner.config.sweep_interval;

    let task = handle.spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match weak.upgrade() {
                Some(inner) => {
                    inner.sweep();
                }
                None => break,
            }
        }
    });

    Some(task.abort_handle())
}

fn expiry(now: DateTime<Utc>, duration: Duration) -> Result<DateTime<Utc>, SessionCreateError> {
    if duration.is_zero() {
        return Err(SessionCreateError::InvalidDuration);
    }
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .ok_or(SessionCreateError::InvalidDuration)
}

fn display_id(id: &str) -> &str {
    if id == ROOT_SLOT { "(root)" } else { id }
}
