use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use shared::{
    domain::{RecordId, TodoRecord, UserId},
    protocol::Predicate,
};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

use crate::{
    collection::Collection,
    error::{SyncError, SyncResult},
    session::{AuthSession, AuthState, Session},
    table::RemoteTable,
    voice::{Confirmation, Dictation, VoiceCapture},
};

pub const DEFAULT_MAX_LOGIN_ATTEMPTS: u32 = 3;

/// How a command that reached the service ended locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Applied(T),
    /// A refresh was already queued or running; this one was dropped.
    InFlight,
    /// The controller was detached while the command was pending; its
    /// result was discarded.
    Detached,
}

impl<T> Outcome<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SyncEvent<T> {
    SignedIn { identity: UserId },
    SignedOut,
    ItemsReplaced { count: usize },
    ItemAdded(T),
    ItemRemoved { id: RecordId },
    Error(SyncError),
}

/// Sequences "authenticate, then load, then mutate" over one remote table.
///
/// Commands are serialized in arrival order through a fair mutex, so no two
/// network operations overlap against the table or the session.
pub struct SyncController<T: TodoRecord> {
    auth: Mutex<AuthSession>,
    table: Arc<dyn RemoteTable<T>>,
    collection: Mutex<Collection<T>>,
    filter: Predicate,
    max_login_attempts: u32,
    commands: Mutex<()>,
    refresh_queued: AtomicBool,
    generation: AtomicU64,
    events: broadcast::Sender<SyncEvent<T>>,
}

impl<T: TodoRecord> SyncController<T> {
    pub fn new(auth: AuthSession, table: Arc<dyn RemoteTable<T>>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            auth: Mutex::new(auth),
            table,
            collection: Mutex::new(Collection::new()),
            filter: Predicate::eq(T::COMPLETE_FIELD, false),
            max_login_attempts: DEFAULT_MAX_LOGIN_ATTEMPTS,
            commands: Mutex::new(()),
            refresh_queued: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            events,
        }
    }

    pub fn with_max_login_attempts(mut self, attempts: u32) -> Self {
        self.max_login_attempts = attempts.max(1);
        self
    }

    /// Replaces the standing filter used by every refresh.
    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = filter;
        self
    }

    /// The standing filter, incomplete items only unless overridden.
    pub fn filter(&self) -> &Predicate {
        &self.filter
    }

    pub async fn authenticate_and_load(&self) -> SyncResult<Outcome<usize>> {
        let generation = self.current_generation();
        let _command = self.commands.lock().await;
        if self.is_detached(generation) {
            return Ok(Outcome::Detached);
        }

        let was_authenticated = self.auth.lock().await.state() == AuthState::Authenticated;
        let mut attempt = 0;
        let session = loop {
            attempt += 1;
            let result = self.auth.lock().await.ensure_authenticated().await;
            match result {
                Ok(session) => break session,
                Err(SyncError::AuthenticationRequired) if attempt < self.max_login_attempts => {
                    self.report(SyncError::AuthenticationRequired);
                }
                Err(err) => return Err(self.report(err)),
            }
        };

        if self.is_detached(generation) {
            return Ok(Outcome::Detached);
        }
        if !was_authenticated {
            let _ = self.events.send(SyncEvent::SignedIn {
                identity: session.identity,
            });
        }
        self.refresh_locked(generation).await
    }

    /// Replaces the collection with a fresh query result.
    pub async fn refresh(&self) -> SyncResult<Outcome<usize>> {
        if self.refresh_queued.swap(true, Ordering::AcqRel) {
            debug!("sync: refresh already pending, dropping duplicate");
            return Ok(Outcome::InFlight);
        }
        let _slot = RefreshSlot(&self.refresh_queued);
        let generation = self.current_generation();
        let _command = self.commands.lock().await;
        if self.is_detached(generation) {
            return Ok(Outcome::Detached);
        }
        self.refresh_locked(generation).await
    }

    pub async fn create_from_text(&self, text: &str) -> SyncResult<Outcome<T>> {
        let generation = self.current_generation();
        let _command = self.commands.lock().await;
        if self.is_detached(generation) {
            return Ok(Outcome::Detached);
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(self.report(SyncError::write("item text must not be empty")));
        }

        let confirmed = self
            .table
            .insert(T::draft(text))
            .await
            .map_err(|err| self.report(err))?;
        if self.is_detached(generation) {
            return Ok(Outcome::Detached);
        }

        self.collection
            .lock()
            .await
            .add(confirmed.clone())
            .map_err(|err| self.report(SyncError::write(err.to_string())))?;
        info!(id = %confirmed.id(), "sync: item inserted");
        let _ = self.events.send(SyncEvent::ItemAdded(confirmed.clone()));
        Ok(Outcome::Applied(confirmed))
    }

    /// Persists the completion flag, then drops the item from the
    /// incomplete-items view. On failure the flag is restored and the
    /// collection is left untouched.
    pub async fn mark_complete(&self, item: &mut T) -> SyncResult<Outcome<RecordId>> {
        let generation = self.current_generation();
        let _command = self.commands.lock().await;
        if self.is_detached(generation) {
            return Ok(Outcome::Detached);
        }

        let previous = item.is_complete();
        item.set_complete(true);
        if let Err(err) = self.table.update(item).await {
            item.set_complete(previous);
            return Err(self.report(err));
        }
        if self.is_detached(generation) {
            return Ok(Outcome::Detached);
        }

        let id = item.id().clone();
        if self.collection.lock().await.remove(&id).is_some() {
            info!(%id, "sync: item completed");
            let _ = self.events.send(SyncEvent::ItemRemoved { id: id.clone() });
        } else {
            debug!(%id, "sync: completed item was not displayed");
        }
        Ok(Outcome::Applied(id))
    }

    pub async fn delete(&self, id: &RecordId) -> SyncResult<Outcome<RecordId>> {
        let generation = self.current_generation();
        let _command = self.commands.lock().await;
        if self.is_detached(generation) {
            return Ok(Outcome::Detached);
        }

        self.table
            .delete(id)
            .await
            .map_err(|err| self.report(err))?;
        if self.is_detached(generation) {
            return Ok(Outcome::Detached);
        }

        if self.collection.lock().await.remove(id).is_some() {
            let _ = self.events.send(SyncEvent::ItemRemoved { id: id.clone() });
        }
        Ok(Outcome::Applied(id.clone()))
    }

    /// Captures one utterance and, once the user confirms it, saves it as a
    /// new item.
    pub async fn dictate(
        &self,
        voice: &dyn VoiceCapture,
        confirmation: &dyn Confirmation,
    ) -> SyncResult<Dictation<Outcome<T>>> {
        let Some(transcript) = voice.capture().await else {
            debug!("sync: no speech recognized");
            return Ok(Dictation::NothingHeard);
        };
        if !confirmation.confirm(&transcript).await {
            return Ok(Dictation::Declined { transcript });
        }
        self.create_from_text(&transcript).await.map(Dictation::Saved)
    }

    pub async fn logout(&self) {
        let mut auth = self.auth.lock().await;
        if auth.state() == AuthState::Authenticated {
            auth.logout().await;
            let _ = self.events.send(SyncEvent::SignedOut);
        }
    }

    /// Discards the results of every pending command, then logs out.
    pub async fn detach(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.logout().await;
    }

    pub async fn items(&self) -> Vec<T> {
        self.collection.lock().await.items().to_vec()
    }

    pub async fn subscribe_items(&self) -> watch::Receiver<Arc<[T]>> {
        self.collection.lock().await.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent<T>> {
        self.events.subscribe()
    }

    pub async fn auth_state(&self) -> AuthState {
        self.auth.lock().await.state()
    }

    pub async fn session(&self) -> Option<Session> {
        self.auth.lock().await.session().cloned()
    }

    pub async fn login_attempts(&self) -> u32 {
        self.auth.lock().await.login_attempts()
    }

    async fn refresh_locked(&self, generation: u64) -> SyncResult<Outcome<usize>> {
        let mut items = self
            .table
            .query(&self.filter)
            .await
            .map_err(|err| self.report(err))?;
        if self.is_detached(generation) {
            return Ok(Outcome::Detached);
        }

        let fetched = items.len();
        items.retain(|item| item.is_persisted());
        if items.len() != fetched {
            warn!(
                dropped = fetched - items.len(),
                "sync: query returned records without ids"
            );
        }

        let count = items.len();
        self.collection.lock().await.replace(items);
        info!(count, filter = %self.filter, "sync: items refreshed");
        let _ = self.events.send(SyncEvent::ItemsReplaced { count });
        Ok(Outcome::Applied(count))
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn is_detached(&self, generation: u64) -> bool {
        self.current_generation() != generation
    }

    fn report(&self, err: SyncError) -> SyncError {
        warn!("sync: {err}");
        let _ = self.events.send(SyncEvent::Error(err.clone()));
        err
    }
}

/// Releases the pending-refresh flag when the refresh finishes or its future
/// is dropped.
struct RefreshSlot<'a>(&'a AtomicBool);

impl Drop for RefreshSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
