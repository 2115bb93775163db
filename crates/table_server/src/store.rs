use std::collections::HashMap;

use serde_json::{Map, Value};
use shared::{error::ApiError, protocol::Predicate};
use uuid::Uuid;

type JsonObject = Map<String, Value>;

/// Named tables of JSON objects, kept in insertion order.
#[derive(Default)]
pub(crate) struct TableStore {
    tables: HashMap<String, Vec<JsonObject>>,
}

impl TableStore {
    pub(crate) fn query(&self, table: &str, predicate: Option<&Predicate>) -> Vec<Value> {
        self.tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .map(|row| Value::Object(row.clone()))
                    .filter(|row| predicate.map_or(true, |p| p.matches(row)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn insert(&mut self, table: &str, record: Value) -> Result<Value, ApiError> {
        let mut object = into_object(record)?;
        if object.contains_key("id") {
            return Err(ApiError::validation(
                "cannot insert a record that already has an id",
            ));
        }
        object.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        self.tables
            .entry(table.to_string())
            .or_default()
            .push(object.clone());
        Ok(Value::Object(object))
    }

    pub(crate) fn update(&mut self, table: &str, id: &str, record: Value) -> Result<Value, ApiError> {
        let mut object = into_object(record)?;
        match object.get("id") {
            None => {
                object.insert("id".into(), Value::String(id.to_string()));
            }
            Some(Value::String(body_id)) if body_id == id => {}
            Some(_) => {
                return Err(ApiError::validation("record id does not match the request path"));
            }
        }
        let row = self
            .tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| has_id(row, id)))
            .ok_or_else(|| ApiError::not_found(format!("record {id} not found")))?;
        *row = object.clone();
        Ok(Value::Object(object))
    }

    pub(crate) fn delete(&mut self, table: &str, id: &str) -> Result<(), ApiError> {
        let rows = self
            .tables
            .get_mut(table)
            .ok_or_else(|| ApiError::not_found(format!("record {id} not found")))?;
        let index = rows
            .iter()
            .position(|row| has_id(row, id))
            .ok_or_else(|| ApiError::not_found(format!("record {id} not found")))?;
        rows.remove(index);
        Ok(())
    }
}

fn into_object(record: Value) -> Result<JsonObject, ApiError> {
    match record {
        Value::Object(object) => Ok(object),
        _ => Err(ApiError::validation("record must be a JSON object")),
    }
}

fn has_id(row: &JsonObject, id: &str) -> bool {
    row.get("id").and_then(Value::as_str) == Some(id)
}
