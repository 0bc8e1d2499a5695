//! `MemoryCollection`, an in-process [`DocumentCollection`].
//!
//! Behaves like the real store for everything the record controller issues:
//! equality filters (dotted paths, `$and`, `null` matching missing fields,
//! numeric equality across integer and double types, array membership),
//! `$set` updates, an implicit unique `_id` index, generated `ObjectId`s, and
//! named unique / non-unique indexes. Anything else is rejected with
//! [`BackendError::Unsupported`].
//!
//! Clones share the same documents, so a test can hold one handle while a
//! controller owns another.

use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use tokio::sync::RwLock;
use tracing::debug;

use crate::filter::ID_FIELD;
use crate::{BackendError, DocumentCollection, IndexSpec, UpdateOutcome};

const ID_INDEX: &str = "_id_";

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MemoryIndex {
    name: String,
    fields: Vec<String>,
    unique: bool,
}

#[derive(Debug)]
struct State {
    /// Insertion order is the natural order returned by `find`.
    documents: Vec<Document>,
    indexes: Vec<MemoryIndex>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            documents: Vec::new(),
            indexes: vec![MemoryIndex {
                name: ID_INDEX.to_string(),
                fields: vec![ID_FIELD.to_string()],
                unique: true,
            }],
        }
    }
}

impl State {
    fn matching(&self, filter: &Document) -> Result<Vec<usize>, BackendError> {
        let mut hits = Vec::new();
        for (i, document) in self.documents.iter().enumerate() {
            if matches(document, filter)? {
                hits.push(i);
            }
        }
        Ok(hits)
    }

    /// Reject `candidate` if it collides with another document on any unique
    /// index. `skip` is the candidate's own position when it replaces one.
    fn check_unique(&self, candidate: &Document, skip: Option<usize>) -> Result<(), BackendError> {
        for index in self.indexes.iter().filter(|ix| ix.unique) {
            let key = index_key(candidate, &index.fields);
            let clash = self
                .documents
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != skip)
                .any(|(_, other)| keys_equal(&key, &index_key(other, &index.fields)));
            if clash {
                return Err(BackendError::DuplicateKey {
                    index: index.name.clone(),
                    key: render_key(&index.fields, &key),
                });
            }
        }
        Ok(())
    }

    fn update(
        &mut self,
        filter: &Document,
        update: &Document,
        many: bool,
    ) -> Result<UpdateOutcome, BackendError> {
        validate_update(update)?;

        let mut hits = self.matching(filter)?;
        if !many {
            hits.truncate(1);
        }

        let mut outcome = UpdateOutcome::default();
        for i in hits {
            outcome.matched += 1;
            let mut updated = self.documents[i].clone();
            apply_update(&mut updated, update)?;
            if updated == self.documents[i] {
                continue;
            }
            self.check_unique(&updated, Some(i))?;
            self.documents[i] = updated;
            outcome.modified += 1;
        }
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// MemoryCollection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MemoryCollection {
    name: Arc<str>,
    state: Arc<RwLock<State>>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.state.read().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every stored document, in insertion order.
    pub async fn documents(&self) -> Vec<Document> {
        self.state.read().await.documents.clone()
    }

    /// Names of all indexes, starting with `_id_`.
    pub async fn index_names(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .indexes
            .iter()
            .map(|ix| ix.name.clone())
            .collect()
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, document: Document) -> Result<(), BackendError> {
        let document = if document.contains_key(ID_FIELD) {
            document
        } else {
            let mut with_id = Document::new();
            with_id.insert(ID_FIELD, ObjectId::new());
            with_id.extend(document);
            with_id
        };

        let mut state = self.state.write().await;
        state.check_unique(&document, None)?;
        state.documents.push(document);
        Ok(())
    }

    async fn find_one(&self, filter: Document) -> Result<Option<Document>, BackendError> {
        let state = self.state.read().await;
        let hit = state.matching(&filter)?.first().copied();
        Ok(hit.map(|i| state.documents[i].clone()))
    }

    async fn find(&self, filter: Document) -> Result<Vec<Document>, BackendError> {
        let state = self.state.read().await;
        let hits = state.matching(&filter)?;
        Ok(hits.into_iter().map(|i| state.documents[i].clone()).collect())
    }

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, BackendError> {
        self.state.write().await.update(&filter, &update, false)
    }

    async fn update_many(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, BackendError> {
        self.state.write().await.update(&filter, &update, true)
    }

    async fn delete_one(&self, filter: Document) -> Result<u64, BackendError> {
        let mut state = self.state.write().await;
        match state.matching(&filter)?.first() {
            Some(&i) => {
                state.documents.remove(i);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, filter: Document) -> Result<u64, BackendError> {
        let mut state = self.state.write().await;
        let hits = state.matching(&filter)?;
        for &i in hits.iter().rev() {
            state.documents.remove(i);
        }
        Ok(hits.len() as u64)
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<String, BackendError> {
        if spec.is_empty() {
            return Err(BackendError::Invalid("index keys must not be empty".into()));
        }
        let name = spec.default_name();
        let mut state = self.state.write().await;

        if let Some(existing) = state.indexes.iter().find(|ix| ix.name == name) {
            if existing.unique != spec.is_unique() {
                return Err(BackendError::Invalid(format!(
                    "index '{name}' already exists with different options"
                )));
            }
            return Ok(name);
        }

        let index = MemoryIndex {
            name: name.clone(),
            fields: spec.keys().map(|(f, _)| f.to_string()).collect(),
            unique: spec.is_unique(),
        };

        if index.unique {
            let keys: Vec<Vec<Bson>> = state
                .documents
                .iter()
                .map(|d| index_key(d, &index.fields))
                .collect();
            for (i, key) in keys.iter().enumerate() {
                if keys[..i].iter().any(|earlier| keys_equal(earlier, key)) {
                    return Err(BackendError::DuplicateKey {
                        index: name,
                        key: render_key(&index.fields, key),
                    });
                }
            }
        }

        debug!(collection = %self.name, index = %name, "created index");
        state.indexes.push(index);
        Ok(name)
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

fn matches(document: &Document, filter: &Document) -> Result<bool, BackendError> {
    for (key, expected) in filter {
        let ok = if key == "$and" {
            let clauses = match expected {
                Bson::Array(clauses) if !clauses.is_empty() => clauses,
                _ => {
                    return Err(BackendError::Invalid(
                        "$and must be a nonempty array".into(),
                    ))
                }
            };
            let mut all = true;
            for clause in clauses {
                let clause = clause.as_document().ok_or_else(|| {
                    BackendError::Invalid("$and entries must be documents".into())
                })?;
                if !matches(document, clause)? {
                    all = false;
                    break;
                }
            }
            all
        } else if key.starts_with('$') {
            return Err(BackendError::Unsupported(format!("query operator {key}")));
        } else {
            if let Bson::Document(inner) = expected {
                if let Some(op) = inner.keys().find(|k| k.starts_with('$')) {
                    return Err(BackendError::Unsupported(format!("query operator {op}")));
                }
            }
            field_matches(lookup(document, key), expected)
        };

        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn field_matches(actual: Option<&Bson>, expected: &Bson) -> bool {
    match actual {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| values_equal(item, expected))
        }
        Some(value) => values_equal(value, expected),
    }
}

fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }
    Some(current)
}

/// Integer equality is exact. A double only equals an integer that converts
/// to `f64` without loss. Embedded documents compare in key order.
fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Double(x), Bson::Double(y)) => x == y,
        (Bson::Double(x), other) | (other, Bson::Double(x)) => {
            as_integer(other).map_or(false, |n| integer_equals_double(n, *x))
        }
        (Bson::Document(x), Bson::Document(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|((kx, vx), (ky, vy))| kx == ky && values_equal(vx, vy))
        }
        (Bson::Array(x), Bson::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(vx, vy)| values_equal(vx, vy))
        }
        _ => match (as_integer(a), as_integer(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

fn as_integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        _ => None,
    }
}

fn integer_equals_double(n: i64, x: f64) -> bool {
    let widened = n as f64;
    // i128 keeps values near i64::MAX from saturating back to `n`.
    widened == x && widened as i128 == i128::from(n)
}

fn index_key(document: &Document, fields: &[String]) -> Vec<Bson> {
    fields
        .iter()
        .map(|f| lookup(document, f).cloned().unwrap_or(Bson::Null))
        .collect()
}

fn keys_equal(a: &[Bson], b: &[Bson]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
}

fn render_key(fields: &[String], key: &[Bson]) -> String {
    let parts: Vec<String> = fields
        .iter()
        .zip(key)
        .map(|(f, v)| format!("{f}: {v}"))
        .collect();
    format!("{{ {} }}", parts.join(", "))
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

fn validate_update(update: &Document) -> Result<(), BackendError> {
    if update.is_empty() {
        return Err(BackendError::Invalid("update document must not be empty".into()));
    }
    for (op, fields) in update {
        if !op.starts_with('$') {
            return Err(BackendError::Invalid(
                "update document requires atomic operators".into(),
            ));
        }
        if op != "$set" {
            return Err(BackendError::Unsupported(format!("update operator {op}")));
        }
        if fields.as_document().is_none() {
            return Err(BackendError::Invalid("$set requires a document".into()));
        }
    }
    Ok(())
}

/// Apply a validated `$set` update in place.
fn apply_update(document: &mut Document, update: &Document) -> Result<(), BackendError> {
    for (_, fields) in update {
        let Some(fields) = fields.as_document() else {
            continue;
        };
        for (path, value) in fields {
            if path == ID_FIELD {
                let unchanged = document
                    .get(ID_FIELD)
                    .map_or(false, |current| values_equal(current, value));
                if !unchanged {
                    return Err(BackendError::Invalid(
                        "performing an update on the path '_id' would modify the immutable field '_id'"
                            .into(),
                    ));
                }
                continue;
            }
            set_path(document, path, value.clone())?;
        }
    }
    Ok(())
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> Result<(), BackendError> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = document
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));
            match child {
                Bson::Document(inner) => set_path(inner, rest, value),
                _ => Err(BackendError::Invalid(format!(
                    "cannot create field '{rest}' in non-document element '{head}'"
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    async fn seeded() -> MemoryCollection {
        let coll = MemoryCollection::new("things");
        for document in [
            doc! { "_id": 1, "kind": "a", "size": 10, "meta": { "tag": "x" } },
            doc! { "_id": 2, "kind": "b", "size": 20_i64, "tags": ["red", "blue"] },
            doc! { "_id": 3, "kind": "a", "size": 30.0 },
        ] {
            coll.insert_one(document).await.unwrap();
        }
        coll
    }

    #[tokio::test]
    async fn equality_filters_follow_store_semantics() {
        let coll = seeded().await;

        let hits = coll.find(doc! { "kind": "a" }).await.unwrap();
        assert_eq!(hits.len(), 2);

        // numeric equality across Int32 / Int64 / Double
        assert_eq!(coll.find(doc! { "size": 20 }).await.unwrap().len(), 1);
        assert_eq!(coll.find(doc! { "size": 30 }).await.unwrap().len(), 1);

        // dotted paths, array membership, null matches missing
        assert_eq!(coll.find(doc! { "meta.tag": "x" }).await.unwrap().len(), 1);
        assert_eq!(coll.find(doc! { "tags": "blue" }).await.unwrap().len(), 1);
        assert_eq!(coll.find(doc! { "tags": Bson::Null }).await.unwrap().len(), 2);

        let and = doc! { "$and": [ { "kind": "a" }, { "kind": "b" } ] };
        assert!(coll.find(and).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn large_integer_ids_stay_distinct() {
        let coll = MemoryCollection::new("things");
        let low = 9_007_199_254_740_992_i64;
        let high = low + 1;
        coll.insert_one(doc! { "_id": low, "n": "a" }).await.unwrap();
        coll.insert_one(doc! { "_id": high, "n": "b" }).await.unwrap();

        let found = coll.find_one(doc! { "_id": high }).await.unwrap().unwrap();
        assert_eq!(found.get_str("n").unwrap(), "b");

        // 2^53 + 1 has no exact f64 form; the rounded double only hits 2^53
        let rounded = coll.find(doc! { "_id": high as f64 }).await.unwrap();
        assert_eq!(rounded.len(), 1);
        assert_eq!(rounded[0].get_str("n").unwrap(), "a");
        assert!(coll.find(doc! { "_id": i64::MAX as f64 }).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embedded_documents_match_in_key_order() {
        let coll = MemoryCollection::new("things");
        coll.insert_one(doc! { "_id": 1, "pos": { "x": 1, "y": 2 } }).await.unwrap();

        assert_eq!(coll.find(doc! { "pos": { "x": 1, "y": 2_i64 } }).await.unwrap().len(), 1);
        assert!(coll.find(doc! { "pos": { "y": 2, "x": 1 } }).await.unwrap().is_empty());
        assert!(coll.find(doc! { "pos": { "x": 1 } }).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_and_is_rejected() {
        let coll = seeded().await;
        let err = coll.find(doc! { "$and": [] }).await.unwrap_err();
        assert!(matches!(err, BackendError::Invalid(_)));
    }

    #[tokio::test]
    async fn unknown_operators_are_rejected() {
        let coll = seeded().await;
        let err = coll.find(doc! { "size": { "$gt": 5 } }).await.unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)));

        let err = coll
            .update_many(doc! {}, doc! { "$inc": { "size": 1 } })
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)));
    }

    #[tokio::test]
    async fn missing_id_is_generated() {
        let coll = MemoryCollection::new("things");
        coll.insert_one(doc! { "kind": "anon" }).await.unwrap();

        let stored = coll.documents().await;
        assert!(matches!(stored[0].get("_id"), Some(Bson::ObjectId(_))));
        assert_eq!(stored[0].keys().next().map(String::as_str), Some("_id"));
    }

    #[tokio::test]
    async fn set_rejects_changing_the_identifier() {
        let coll = seeded().await;
        let err = coll
            .update_one(doc! { "_id": 1 }, doc! { "$set": { "_id": 9 } })
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Invalid(_)));

        // same value is accepted
        let outcome = coll
            .update_one(doc! { "_id": 1 }, doc! { "$set": { "_id": 1, "meta.tag": "y" } })
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 1 });
        let updated = coll.find_one(doc! { "_id": 1 }).await.unwrap().unwrap();
        assert_eq!(updated.get_document("meta").unwrap(), &doc! { "tag": "y" });
    }

    #[tokio::test]
    async fn unique_index_names_and_conflicts() {
        let coll = seeded().await;

        let spec = IndexSpec::new().ascending("kind").unique(true);
        let err = coll.create_index(&spec).await.unwrap_err();
        assert!(err.is_duplicate_key());

        let spec = IndexSpec::new().ascending("kind").descending("size").unique(true);
        assert_eq!(coll.create_index(&spec).await.unwrap(), "kind_1_size_-1");
        // re-creating is a no-op
        assert_eq!(coll.create_index(&spec).await.unwrap(), "kind_1_size_-1");
        assert_eq!(coll.index_names().await, vec!["_id_", "kind_1_size_-1"]);

        let err = coll
            .insert_one(doc! { "_id": 4, "kind": "a", "size": 10 })
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());
    }
}
