use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Opaque identifier assigned by the service on first insert.
///
/// An empty id marks a draft that has never been persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An entity stored in a remote table.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    fn id(&self) -> &RecordId;
    fn set_id(&mut self, id: RecordId);

    fn is_persisted(&self) -> bool {
        !self.id().is_empty()
    }
}

/// A record that can be drafted from free text and carries a completion flag.
pub trait TodoRecord: Record {
    /// Wire name of the completion flag, used by the standing filter.
    const COMPLETE_FIELD: &'static str;

    fn draft(text: &str) -> Self;
    fn is_complete(&self) -> bool;
    fn set_complete(&mut self, complete: bool);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    #[serde(default, skip_serializing_if = "RecordId::is_empty")]
    pub id: RecordId,
    pub text: String,
    #[serde(default)]
    pub complete: bool,
}

impl Record for TodoItem {
    fn id(&self) -> &RecordId {
        &self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }
}

impl TodoRecord for TodoItem {
    const COMPLETE_FIELD: &'static str = "complete";

    fn draft(text: &str) -> Self {
        Self {
            id: RecordId::default(),
            text: text.to_string(),
            complete: false,
        }
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn set_complete(&mut self, complete: bool) {
        self.complete = complete;
    }
}
