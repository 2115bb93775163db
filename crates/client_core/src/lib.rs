//! Keeps a local list of records consistent with one remote table through
//! authenticated, confirmed-then-applied CRUD operations.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use shared::domain::TodoItem;

pub mod collection;
pub mod config;
pub mod controller;
pub mod error;
pub mod reachability;
pub mod service;
pub mod session;
pub mod table;
pub mod voice;

pub use collection::{Collection, UnconfirmedRecord};
pub use config::{load_settings, ClientSettings};
pub use controller::{Outcome, SyncController, SyncEvent};
pub use error::{SyncError, SyncResult};
pub use reachability::{AlwaysReachable, ReachabilityProbe, TcpReachabilityProbe};
pub use service::ServiceClient;
pub use session::{
    AuthSession, AuthState, CredentialPrompt, HttpLoginProvider, LoginError, LoginProvider,
    Session, StaticCredentials,
};
pub use table::{HttpRemoteTable, RemoteTable};
pub use voice::{Confirmation, Dictation, VoiceCapture};

/// Wires the HTTP table, login provider and TCP reachability probe for the
/// todo table described by `settings`.
pub fn todo_controller(
    settings: &ClientSettings,
    prompt: Arc<dyn CredentialPrompt>,
) -> Result<SyncController<TodoItem>> {
    let service = ServiceClient::from_settings(settings)?;
    let probe = TcpReachabilityProbe::for_url(service.base_url())
        .ok_or_else(|| anyhow!("service url has no host: {}", service.base_url()))?;
    let login = HttpLoginProvider::new(
        Arc::clone(&service),
        settings.login_provider.clone(),
        prompt,
    );
    let auth = AuthSession::new(Arc::new(login), Arc::new(probe));
    let table: Arc<dyn RemoteTable<TodoItem>> =
        Arc::new(service.table::<TodoItem>(settings.table_name.clone()));
    Ok(SyncController::new(auth, table).with_max_login_attempts(settings.max_login_attempts))
}
