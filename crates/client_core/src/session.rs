use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use shared::{
    domain::UserId,
    protocol::{LoginRequest, LoginResponse},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    error::{describe_transport_error, SyncError, SyncResult},
    reachability::ReachabilityProbe,
    service::{error_message, ServiceClient},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: UserId,
    pub token: String,
    pub authenticated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

#[derive(Debug, Error)]
pub enum LoginError {
    /// Cancelled by the user, rejected, or provider misconfigured.
    #[error("login operation invalid: {0}")]
    InvalidOperation(String),
    #[error("login service unreachable: {0}")]
    Unreachable(String),
}

/// Interactive login flow against the identity provider.
#[async_trait]
pub trait LoginProvider: Send + Sync {
    async fn login(&self) -> Result<Session, LoginError>;
    async fn logout(&self) -> anyhow::Result<()>;
}

/// Holds the current session and runs at most one login per call.
pub struct AuthSession {
    provider: Arc<dyn LoginProvider>,
    probe: Arc<dyn ReachabilityProbe>,
    session: Option<Session>,
    login_attempts: u32,
}

impl AuthSession {
    pub fn new(provider: Arc<dyn LoginProvider>, probe: Arc<dyn ReachabilityProbe>) -> Self {
        Self {
            provider,
            probe,
            session: None,
            login_attempts: 0,
        }
    }

    pub fn state(&self) -> AuthState {
        if self.session.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn login_attempts(&self) -> u32 {
        self.login_attempts
    }

    pub async fn ensure_authenticated(&mut self) -> SyncResult<Session> {
        if let Some(session) = &self.session {
            return Ok(session.clone());
        }

        if !self.probe.is_reachable().await {
            warn!("auth: network unreachable, skipping login");
            return Err(SyncError::NetworkUnavailable);
        }

        self.login_attempts += 1;
        match self.provider.login().await {
            Ok(session) => {
                info!(identity = %session.identity, "auth: you are now logged in");
                self.session = Some(session.clone());
                Ok(session)
            }
            Err(LoginError::InvalidOperation(reason)) => {
                warn!(%reason, "auth: login required");
                Err(SyncError::AuthenticationRequired)
            }
            Err(LoginError::Unreachable(reason)) => {
                warn!(%reason, "auth: login service unreachable");
                Err(SyncError::NetworkUnavailable)
            }
        }
    }

    /// Always clears the local session; remote notification is best-effort.
    pub async fn logout(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if let Err(err) = self.provider.logout().await {
            warn!(identity = %session.identity, "auth: remote logout failed: {err:#}");
        }
        info!(identity = %session.identity, "auth: logged out");
    }
}

/// Supplies a user name when a login is attempted.
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    /// `None` means the user cancelled.
    async fn username(&self) -> Option<String>;
}

pub struct StaticCredentials(pub String);

#[async_trait]
impl CredentialPrompt for StaticCredentials {
    async fn username(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Logs in with `POST /login/{provider}` and installs the returned token on
/// the shared [`ServiceClient`].
pub struct HttpLoginProvider {
    service: Arc<ServiceClient>,
    provider: String,
    prompt: Arc<dyn CredentialPrompt>,
}

impl HttpLoginProvider {
    pub fn new(
        service: Arc<ServiceClient>,
        provider: impl Into<String>,
        prompt: Arc<dyn CredentialPrompt>,
    ) -> Self {
        Self {
            service,
            provider: provider.into(),
            prompt,
        }
    }
}

#[async_trait]
impl LoginProvider for HttpLoginProvider {
    async fn login(&self) -> Result<Session, LoginError> {
        let username = self
            .prompt
            .username()
            .await
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| LoginError::InvalidOperation("login cancelled".into()))?;

        let url = self.service.endpoint(&["login", &self.provider]);
        let response = self
            .service
            .request(Method::POST, url)
            .await
            .json(&LoginRequest { username })
            .send()
            .await
            .map_err(|err| LoginError::Unreachable(describe_transport_error(&err)))?;
        if !response.status().is_success() {
            return Err(LoginError::InvalidOperation(error_message(response).await));
        }
        let body: LoginResponse = response
            .json()
            .await
            .map_err(|err| LoginError::InvalidOperation(format!("invalid login response: {err}")))?;

        self.service
            .set_auth_token(Some(body.authentication_token.clone()))
            .await;
        Ok(Session {
            identity: body.user.user_id,
            token: body.authentication_token,
            authenticated_at: Utc::now(),
        })
    }

    async fn logout(&self) -> anyhow::Result<()> {
        let url = self.service.endpoint(&["logout"]);
        let result: anyhow::Result<()> = async {
            self.service
                .request(Method::POST, url)
                .await
                .send()
                .await
                .context("failed to reach logout endpoint")?
                .error_for_status()
                .context("logout rejected")?;
            Ok(())
        }
        .await;
        self.service.set_auth_token(None).await;
        result
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
