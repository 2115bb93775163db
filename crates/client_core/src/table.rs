use std::{marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use shared::{
    domain::{Record, RecordId},
    protocol::{Predicate, FILTER_PARAM},
};
use tracing::debug;

use crate::{
    error::{describe_transport_error, SyncError, SyncResult},
    service::{error_message, ServiceClient},
};

/// One remote collection. Every call is a single round trip; nothing is
/// retried or batched.
#[async_trait]
pub trait RemoteTable<T: Record>: Send + Sync {
    /// Fresh snapshot of the records matching `predicate`, in service order.
    async fn query(&self, predicate: &Predicate) -> SyncResult<Vec<T>>;
    /// Persists a draft and returns it with its service-assigned id.
    async fn insert(&self, item: T) -> SyncResult<T>;
    /// Full replacement of a persisted record.
    async fn update(&self, item: &T) -> SyncResult<()>;
    /// Deleting an id the service no longer knows is not an error.
    async fn delete(&self, id: &RecordId) -> SyncResult<()>;
}

pub struct HttpRemoteTable<T> {
    service: Arc<ServiceClient>,
    name: String,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> HttpRemoteTable<T> {
    pub fn new(service: Arc<ServiceClient>, name: impl Into<String>) -> Self {
        Self {
            service,
            name: name.into(),
            _record: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn collection_url(&self) -> url::Url {
        self.service.endpoint(&["tables", &self.name])
    }

    fn record_url(&self, id: &RecordId) -> url::Url {
        self.service.endpoint(&["tables", &self.name, id.as_str()])
    }
}

#[async_trait]
impl<T: Record> RemoteTable<T> for HttpRemoteTable<T> {
    async fn query(&self, predicate: &Predicate) -> SyncResult<Vec<T>> {
        let filter = predicate.to_filter();
        debug!(table = %self.name, %filter, "table: query");
        let response = self
            .service
            .request(Method::GET, self.collection_url())
            .await
            .query(&[(FILTER_PARAM, filter.as_str())])
            .send()
            .await
            .map_err(|err| SyncError::query(describe_transport_error(&err)))?;
        if !response.status().is_success() {
            return Err(SyncError::query(error_message(response).await));
        }
        response
            .json::<Vec<T>>()
            .await
            .map_err(|err| SyncError::query(format!("invalid query response: {err}")))
    }

    async fn insert(&self, item: T) -> SyncResult<T> {
        if item.is_persisted() {
            return Err(SyncError::write(format!(
                "record {} was already inserted",
                item.id()
            )));
        }
        let mut body = serde_json::to_value(&item)
            .map_err(|err| SyncError::write(format!("failed to encode record: {err}")))?;
        if let Some(object) = body.as_object_mut() {
            object.remove("id");
        }

        debug!(table = %self.name, "table: insert");
        let response = self
            .service
            .request(Method::POST, self.collection_url())
            .await
            .json(&body)
            .send()
            .await
            .map_err(|err| SyncError::write(describe_transport_error(&err)))?;
        if !response.status().is_success() {
            return Err(SyncError::write(error_message(response).await));
        }
        let inserted: T = response
            .json()
            .await
            .map_err(|err| SyncError::write(format!("invalid insert response: {err}")))?;
        if !inserted.is_persisted() {
            return Err(SyncError::write("service did not assign an id"));
        }
        Ok(inserted)
    }

    async fn update(&self, item: &T) -> SyncResult<()> {
        if !item.is_persisted() {
            return Err(SyncError::write("cannot update a record that was never inserted"));
        }

        debug!(table = %self.name, id = %item.id(), "table: update");
        let response = self
            .service
            .request(Method::PATCH, self.record_url(item.id()))
            .await
            .json(item)
            .send()
            .await
            .map_err(|err| SyncError::write(describe_transport_error(&err)))?;
        if !response.status().is_success() {
            return Err(SyncError::write(error_message(response).await));
        }
        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> SyncResult<()> {
        if id.is_empty() {
            return Ok(());
        }

        debug!(table = %self.name, %id, "table: delete");
        let response = self
            .service
            .request(Method::DELETE, self.record_url(id))
            .await
            .send()
            .await
            .map_err(|err| SyncError::write(describe_transport_error(&err)))?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(SyncError::write(error_message(response).await))
    }
}

#[cfg(test)]
#[path = "tests/table_tests.rs"]
mod tests;
