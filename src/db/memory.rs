//! In-process document store
//!
//! Keeps records as BSON documents behind a single async mutex, so every
//! operation (including conditional updates and find-or-insert) is atomic in
//! the same way a single MongoDB document write is. Used in dev mode when no
//! MongoDB is configured, and by the test suites.

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, DateTime, Document};
use std::marker::PhantomData;
use tokio::sync::Mutex;

use crate::db::store::{DocumentStore, Patch, Record};
use crate::types::{MentorError, Result};

/// In-memory [`DocumentStore`]
pub struct MemoryStore<T> {
    docs: Mutex<Vec<Document>>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> MemoryStore<T> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(Vec::new()),
            _record: PhantomData,
        }
    }

    /// Number of live documents
    pub async fn len(&self) -> usize {
        self.docs.lock().await.iter().filter(|d| !is_deleted(d)).count()
    }

    /// True when the store has no live documents
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<T: Record> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn is_deleted(doc: &Document) -> bool {
    matches!(get_path(doc, "metadata.is_deleted"), Some(Bson::Boolean(true)))
}

/// Resolve a dotted path such as `metadata.updated_at`
fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = doc.get(first)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

fn set_path(doc: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(doc.get(head), Some(Bson::Document(_))) {
                doc.insert(head, Document::new());
            }
            if let Some(Bson::Document(inner)) = doc.get_mut(head) {
                set_path(inner, rest, value);
            }
        }
    }
}

fn bson_eq(actual: Option<&Bson>, expected: &Bson) -> bool {
    match (actual, expected) {
        (None, Bson::Null) | (Some(Bson::Null), Bson::Null) => true,
        (Some(a), e) => match (as_i64(a), as_i64(e)) {
            (Some(x), Some(y)) => x == y,
            _ => a == e,
        },
        (None, _) => false,
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        _ => None,
    }
}

fn matches(doc: &Document, filter: &Document) -> bool {
    !is_deleted(doc) && filter.iter().all(|(k, v)| bson_eq(get_path(doc, k), v))
}

fn increment(current: Option<&Bson>, delta: &Bson) -> Result<Bson> {
    let current = current.cloned().unwrap_or(Bson::Int64(0));
    let non_numeric = || MentorError::Database("Cannot increment a non-numeric field".into());

    match (&current, delta) {
        (Bson::Double(a), d) => as_f64(d).map(|d| Bson::Double(a + d)).ok_or_else(non_numeric),
        (a, Bson::Double(d)) => as_f64(a).map(|a| Bson::Double(a + d)).ok_or_else(non_numeric),
        (a, d) => {
            let (a, d) = as_i64(a).zip(as_i64(d)).ok_or_else(non_numeric)?;
            a.checked_add(d)
                .map(Bson::Int64)
                .ok_or_else(|| MentorError::Database("Increment overflows the field".into()))
        }
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) => Some(*v),
        other => as_i64(other).map(|v| v as f64),
    }
}

fn apply(doc: &mut Document, patch: &Patch) -> Result<()> {
    for (key, value) in patch.set.iter() {
        set_path(doc, key, value.clone());
    }
    for (key, delta) in patch.inc.iter() {
        let next = increment(get_path(doc, key), delta)?;
        set_path(doc, key, next);
    }
    set_path(doc, "metadata.updated_at", Bson::DateTime(DateTime::now()));
    Ok(())
}

fn stamp_new<T: Record>(record: &mut T) {
    if record.id().is_none() {
        record.set_id(ObjectId::new());
    }
    let metadata = record.mut_metadata();
    metadata.is_deleted = false;
    metadata.created_at = Some(DateTime::now());
    metadata.updated_at = Some(DateTime::now());
}

#[async_trait]
impl<T: Record> DocumentStore<T> for MemoryStore<T> {
    async fn insert(&self, mut record: T) -> Result<T> {
        stamp_new(&mut record);
        let doc = bson::to_document(&record)?;

        let mut docs = self.docs.lock().await;
        if docs.iter().any(|d| d.get("_id") == doc.get("_id")) {
            return Err(MentorError::Conflict(format!(
                "Duplicate {} record",
                T::COLLECTION
            )));
        }
        docs.push(doc);
        Ok(record)
    }

    async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        let docs = self.docs.lock().await;
        match docs.iter().find(|d| matches(d, &filter)) {
            Some(doc) => Ok(Some(bson::from_document(doc.clone())?)),
            None => Ok(None),
        }
    }

    async fn find_many(&self, filter: Document) -> Result<Vec<T>> {
        let docs = self.docs.lock().await;
        docs.iter()
            .filter(|d| matches(d, &filter))
            .map(|d| bson::from_document(d.clone()).map_err(MentorError::from))
            .collect()
    }

    async fn update_one(&self, filter: Document, patch: Patch) -> Result<Option<T>> {
        let mut docs = self.docs.lock().await;
        let Some(doc) = docs.iter_mut().find(|d| matches(d, &filter)) else {
            return Ok(None);
        };

        let mut updated = doc.clone();
        apply(&mut updated, &patch)?;
        let record: T = bson::from_document(updated.clone())?;
        *doc = updated;
        Ok(Some(record))
    }

    async fn find_or_insert(&self, filter: Document, mut record: T) -> Result<T> {
        let mut docs = self.docs.lock().await;
        if let Some(existing) = docs.iter().find(|d| matches(d, &filter)) {
            return Ok(bson::from_document(existing.clone())?);
        }

        stamp_new(&mut record);
        docs.push(bson::to_document(&record)?);
        Ok(record)
    }
}
