use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use shared::{domain::Record, error::ApiError, protocol::AUTH_HEADER};
use tokio::sync::RwLock;
use url::Url;

use crate::{config::ClientSettings, table::HttpRemoteTable};

/// Shared handle to one table service: HTTP client, base URL and the
/// token installed by a successful login.
pub struct ServiceClient {
    http: Client,
    base_url: Url,
    auth_token: RwLock<Option<String>>,
}

impl ServiceClient {
    pub fn new(base_url: Url, timeout: Option<Duration>) -> Result<Arc<Self>> {
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("service url cannot be used as a base: {base_url}"));
        }
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build http client")?;
        Ok(Arc::new(Self {
            http,
            base_url,
            auth_token: RwLock::new(None),
        }))
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Arc<Self>> {
        let base_url = Url::parse(&settings.service_url)
            .with_context(|| format!("invalid service url '{}'", settings.service_url))?;
        Self::new(
            base_url,
            settings.request_timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn table<T: Record>(self: &Arc<Self>, name: impl Into<String>) -> HttpRemoteTable<T> {
        HttpRemoteTable::new(Arc::clone(self), name)
    }

    /// Appends percent-encoded path segments to the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub async fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match self.auth_token.read().await.as_deref() {
            Some(token) => builder.header(AUTH_HEADER, token),
            None => builder,
        }
    }

    pub async fn set_auth_token(&self, token: Option<String>) {
        *self.auth_token.write().await = token;
    }

    pub async fn auth_token(&self) -> Option<String> {
        self.auth_token.read().await.clone()
    }
}

/// Prefers the service's `ApiError` message over the bare status line.
pub(crate) async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ApiError>().await {
        Ok(body) if !body.message.is_empty() => body.message,
        _ => match status.canonical_reason() {
            Some(reason) => format!("{} {reason}", status.as_u16()),
            None => format!("HTTP {}", status.as_u16()),
        },
    }
}
