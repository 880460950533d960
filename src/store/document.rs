//! Document-database store: one document per cache key.
//!
//! The database itself sits behind [`DocumentCollection`]; [`DocumentEncoding`]
//! picks whether a record is stored as structured document fields or as a
//! JSON string inside a single field. [`MemoryCollection`] is an in-process
//! collection for tests and local runs.

use super::{KvStore, StoreError, StoreResult};
use crate::cache::CacheKey;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::RwLock;

/// A collection of JSON documents addressed by id.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    async fn get_document(&self, id: &str) -> StoreResult<Option<Map<String, Value>>>;
    async fn set_document(&self, id: &str, document: Map<String, Value>) -> StoreResult<()>;
}

/// How a raw record maps onto a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DocumentEncoding {
    /// The record's fields become the document's fields.
    #[default]
    Structured,
    /// The raw JSON text is kept as a string under `field`.
    JsonString { field: String },
}

pub struct DocumentStore<C> {
    collection: C,
    encoding: DocumentEncoding,
}

impl<C: DocumentCollection> DocumentStore<C> {
    pub fn new(collection: C) -> Self {
        Self {
            collection,
            encoding: DocumentEncoding::default(),
        }
    }

    pub fn with_encoding(mut self, encoding: DocumentEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    fn encode(&self, raw: &str) -> StoreResult<Map<String, Value>> {
        match &self.encoding {
            DocumentEncoding::Structured => match serde_json::from_str::<Value>(raw)? {
                Value::Object(map) => Ok(map),
                _ => Err(StoreError::backend(
                    "document",
                    "structured encoding needs a JSON object",
                )),
            },
            DocumentEncoding::JsonString { field } => {
                let mut doc = Map::new();
                doc.insert(field.clone(), Value::String(raw.to_string()));
                Ok(doc)
            }
        }
    }

    fn decode(&self, mut document: Map<String, Value>) -> StoreResult<Option<String>> {
        match &self.encoding {
            DocumentEncoding::Structured => Ok(Some(serde_json::to_string(&document)?)),
            DocumentEncoding::JsonString { field } => match document.remove(field) {
                Some(Value::String(raw)) => Ok(Some(raw)),
                Some(_) => Err(StoreError::backend(
                    "document",
                    format!("field `{}` is not a string", field),
                )),
                None => Ok(None),
            },
        }
    }
}

#[async_trait]
impl<C: DocumentCollection> KvStore for DocumentStore<C> {
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<String>> {
        match self.collection.get_document(key.as_str()).await? {
            Some(document) => self.decode(document),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &CacheKey, value: &str) -> StoreResult<()> {
        let document = self.encode(value)?;
        self.collection.set_document(key.as_str(), document).await
    }

    fn name(&self) -> &'static str {
        "document"
    }
}

/// In-process document collection.
#[derive(Default)]
pub struct MemoryCollection {
    documents: RwLock<HashMap<String, Map<String, Value>>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one document, as the database would hold it.
    pub fn document(&self, id: &str) -> Option<Map<String, Value>> {
        self.documents.read().ok()?.get(id).cloned()
    }
}

fn poisoned() -> StoreError {
    StoreError::backend("document", "collection lock poisoned")
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    async fn get_document(&self, id: &str) -> StoreResult<Option<Map<String, Value>>> {
        let docs = self.documents.read().map_err(|_| poisoned())?;
        Ok(docs.get(id).cloned())
    }

    async fn set_document(&self, id: &str, document: Map<String, Value>) -> StoreResult<()> {
        let mut docs = self.documents.write().map_err(|_| poisoned())?;
        docs.insert(id.to_string(), document);
        Ok(())
    }
}

#[async_trait]
impl<C: DocumentCollection + ?Sized> DocumentCollection for std::sync::Arc<C> {
    async fn get_document(&self, id: &str) -> StoreResult<Option<Map<String, Value>>> {
        (**self).get_document(id).await
    }

    async fn set_document(&self, id: &str, document: Map<String, Value>) -> StoreResult<()> {
        (**self).set_document(id, document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn json_string_encoding_keeps_raw_text() {
        let store = DocumentStore::new(MemoryCollection::new()).with_encoding(
            DocumentEncoding::JsonString {
                field: "value".into(),
            },
        );
        let key = CacheKey::from("k1");
        store.set(&key, "not even json").await.unwrap();
        assert_eq!(
            store.collection().document("k1"),
            Some(
                json!({"value": "not even json"})
                    .as_object()
                    .cloned()
                    .unwrap()
            )
        );
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("not even json"));
    }

    #[tokio::test]
    async fn structured_encoding_rejects_non_objects() {
        let store = DocumentStore::new(MemoryCollection::new());
        let err = store.set(&CacheKey::from("k"), "[1,2]").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend { backend: "document", .. }));
        let err = store.set(&CacheKey::from("k"), "{").await.unwrap_err();
        assert!(matches!(err, StoreError::Encoding(_)));
    }
}
