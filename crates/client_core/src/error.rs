use thiserror::Error;

/// Failures surfaced to the presentation layer by every sync command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("network connection unavailable; verify your connection and try again")]
    NetworkUnavailable,
    #[error("login required")]
    AuthenticationRequired,
    #[error("error loading items: {message}")]
    RemoteQuery { message: String },
    #[error("error saving item: {message}")]
    RemoteWrite { message: String },
}

impl SyncError {
    pub fn query(message: impl Into<String>) -> Self {
        Self::RemoteQuery {
            message: message.into(),
        }
    }

    pub fn write(message: impl Into<String>) -> Self {
        Self::RemoteWrite {
            message: message.into(),
        }
    }

    /// Short caption for a notification dialog.
    pub fn title(&self) -> &'static str {
        match self {
            SyncError::NetworkUnavailable => "Network unavailable",
            SyncError::AuthenticationRequired => "Login required",
            SyncError::RemoteQuery { .. } => "Error loading items",
            SyncError::RemoteWrite { .. } => "Error saving item",
        }
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Unwraps the innermost message of a reqwest error chain.
pub(crate) fn describe_transport_error(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message = format!("{message}: {inner}");
        source = inner.source();
    }
    message
}
