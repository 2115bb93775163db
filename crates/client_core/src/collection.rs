use std::sync::Arc;

use shared::domain::{Record, RecordId};
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("record has no service-assigned id and cannot be displayed as persisted")]
pub struct UnconfirmedRecord;

/// Ordered local cache of the last confirmed query result plus confirmed
/// mutations. Every change republishes a snapshot to subscribers.
pub struct Collection<T> {
    items: Vec<T>,
    published: watch::Sender<Arc<[T]>>,
}

impl<T: Record> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> Collection<T> {
    pub fn new() -> Self {
        let (published, _) = watch::channel(Arc::from(Vec::new()));
        Self {
            items: Vec::new(),
            published,
        }
    }

    pub fn replace(&mut self, items: Vec<T>) {
        self.items = items;
        self.publish();
    }

    pub fn add(&mut self, item: T) -> Result<(), UnconfirmedRecord> {
        if !item.is_persisted() {
            return Err(UnconfirmedRecord);
        }
        self.items.push(item);
        self.publish();
        Ok(())
    }

    pub fn remove(&mut self, id: &RecordId) -> Option<T> {
        let index = self.items.iter().position(|item| item.id() == id)?;
        let removed = self.items.remove(index);
        self.publish();
        Some(removed)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, id: &RecordId) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<[T]>> {
        self.published.subscribe()
    }

    fn publish(&self) {
        self.published.send_replace(Arc::from(self.items.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::TodoItem;

    fn item(id: &str, text: &str) -> TodoItem {
        TodoItem {
            id: RecordId::from(id),
            text: text.to_string(),
            complete: false,
        }
    }

    #[test]
    fn replace_discards_previous_contents() {
        let mut collection = Collection::new();
        collection.replace(vec![item("1", "a"), item("2", "b")]);
        collection.replace(vec![item("3", "c")]);
        assert_eq!(collection.items(), &[item("3", "c")]);
    }

    #[test]
    fn add_appends_confirmed_items_and_rejects_drafts() {
        let mut collection = Collection::new();
        collection.replace(vec![item("1", "a")]);
        collection.add(item("2", "b")).expect("confirmed");
        assert_eq!(
            collection.add(TodoItem::default()),
            Err(UnconfirmedRecord)
        );
        let ids: Vec<_> = collection.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
    }

    #[test]
    fn remove_matches_by_id_only() {
        let mut collection = Collection::new();
        collection.replace(vec![item("1", "a"), item("2", "b"), item("3", "c")]);
        let mut stale = item("2", "renamed elsewhere");
        stale.complete = true;
        let removed = collection.remove(stale.id()).expect("removed");
        assert_eq!(removed.text, "b");
        assert_eq!(collection.len(), 2);
        assert!(!collection.contains(&RecordId::from("2")));
        assert!(collection.remove(&RecordId::from("missing")).is_none());
    }

    #[test]
    fn subscribers_observe_each_change() {
        let mut collection = Collection::new();
        let mut rx = collection.subscribe();
        assert!(rx.borrow_and_update().is_empty());

        collection.replace(vec![item("1", "a")]);
        assert!(rx.has_changed().expect("open"));
        assert_eq!(rx.borrow_and_update().len(), 1);

        collection.add(item("2", "b")).expect("add");
        assert_eq!(rx.borrow_and_update().len(), 2);

        collection.remove(&RecordId::from("1"));
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.as_ref(), &[item("2", "b")]);
    }
}
