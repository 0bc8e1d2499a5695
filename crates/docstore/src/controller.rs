//! Generic record controller.
//!
//! `RecordController<T>` binds one collection to one record type and exposes
//! the CRUD / list / index operations over it:
//! 1. Builds the filter or update document from typed inputs.
//! 2. Issues exactly one backend call.
//! 3. Decodes the result into `T`, tagging any failure with the operation
//!    name.
//!
//! The controller holds nothing but the collection handle, so one instance
//! can be shared between tasks. Cancellation is the caller's: dropping an
//! operation's future abandons the single backend call it was waiting on.

use std::fmt;
use std::marker::PhantomData;

use bson::{doc, Bson, Document};
use chrono::Utc;
use mongodb::Database;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::filter::UPDATED_AT_FIELD;
use crate::{
    BackendError, DocumentCollection, IndexSpec, MongoCollection, Record, Selector, StoreError,
};

// ---------------------------------------------------------------------------
// RecordController
// ---------------------------------------------------------------------------

/// CRUD access to the records of type `T` stored in one collection.
pub struct RecordController<T, C = MongoCollection> {
    collection: C,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> RecordController<T, MongoCollection> {
    /// Bind to the collection `name` of `database`.
    pub fn from_database(database: &Database, name: &str) -> Self {
        Self::new(MongoCollection::from_database(database, name))
    }
}

impl<T: Record, C: DocumentCollection> RecordController<T, C> {
    pub fn new(collection: C) -> Self {
        Self {
            collection,
            _record: PhantomData,
        }
    }

    /// The bound collection handle.
    pub fn collection(&self) -> &C {
        &self.collection
    }

    /// Insert `record` as a new document.
    ///
    /// Both timestamps are stamped with the same instant before encoding.
    /// The record's identifier must already be set; a duplicate identifier
    /// is reported as [`StoreError::Write`].
    #[instrument(skip_all, fields(collection = %self.collection.name()))]
    pub async fn create(&self, record: &mut T) -> Result<(), StoreError> {
        debug!("insert_one started");
        let now = Utc::now();
        record.stamp_created(now);
        record.stamp_updated(now);

        let document = encode("create", record)?;
        self.collection
            .insert_one(document)
            .await
            .map_err(write_error("create"))?;

        debug!("insert_one finished");
        Ok(())
    }

    /// Fetch the record whose `_id` equals `id`.
    #[instrument(skip_all, fields(collection = %self.collection.name()))]
    pub async fn get(&self, id: impl Into<Bson>) -> Result<T, StoreError> {
        let id = id.into();
        debug!(%id, "find_one started");
        let record = self.find_one("get", Selector::by_id(id).to_document()).await?;
        debug!("find_one finished");
        Ok(record)
    }

    /// Fetch one record matching every predicate in `selector`.
    ///
    /// If several documents match, the first one the store returns wins. An
    /// empty selector matches any document.
    #[instrument(skip_all, fields(collection = %self.collection.name(), predicates = selector.len()))]
    pub async fn find(&self, selector: &Selector) -> Result<T, StoreError> {
        debug!("find_one started");
        let record = self.find_one("find", selector.to_document()).await?;
        debug!("find_one finished");
        Ok(record)
    }

    /// Like [`find`](Self::find), but a miss is `Ok(None)` instead of
    /// [`StoreError::NotFound`].
    ///
    /// Every other failure keeps its own variant: a backend failure is
    /// [`StoreError::Read`] and an undecodable match is
    /// [`StoreError::Decoding`]. Neither is rewrapped.
    #[instrument(skip_all, fields(collection = %self.collection.name(), predicates = selector.len()))]
    pub async fn exists(&self, selector: &Selector) -> Result<Option<T>, StoreError> {
        match self.find_one("exists", selector.to_document()).await {
            Ok(record) => Ok(Some(record)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Overwrite the fields of the document whose `_id` equals `id` with the
    /// encoded `record` (a `$set` of every field).
    ///
    /// Only `updated_at` is stamped. When no document has that identifier
    /// nothing is written and `Ok(())` is still returned.
    #[instrument(skip_all, fields(collection = %self.collection.name()))]
    pub async fn update(&self, id: impl Into<Bson>, record: &mut T) -> Result<(), StoreError> {
        let id = id.into();
        debug!(%id, "update_one started");
        record.stamp_updated(Utc::now());

        let fields = encode("update", record)?;
        let outcome = self
            .collection
            .update_one(Selector::by_id(id.clone()).to_document(), doc! { "$set": fields })
            .await
            .map_err(write_error("update"))?;

        // TODO: decide with the data owners whether a missed identifier
        // should become NotFound; callers currently rely on the silent no-op.
        if outcome.matched == 0 {
            warn!(%id, "update matched no document; nothing was written");
        }
        debug!(matched = outcome.matched, modified = outcome.modified, "update_one finished");
        Ok(())
    }

    /// Set the fields in `attributes` on every document matching `selector`.
    ///
    /// `attributes` may be any value that encodes to a document: a map, a
    /// `serde_json` object, a struct, or [`Attributes`](crate::Attributes).
    /// `updated_at` is always overwritten with the current time, encoded by
    /// [`Record::updated_at_value`].
    #[instrument(skip_all, fields(collection = %self.collection.name(), predicates = selector.len()))]
    pub async fn update_attributes<A>(
        &self,
        selector: &Selector,
        attributes: &A,
    ) -> Result<(), StoreError>
    where
        A: Serialize + ?Sized,
    {
        debug!("update_many started");
        let mut fields = bson::to_document(attributes).map_err(|source| {
            StoreError::Serialization { operation: "update_attributes", source }
        })?;
        let stamp = T::updated_at_value(Utc::now()).map_err(|source| {
            StoreError::Serialization { operation: "update_attributes", source }
        })?;
        fields.insert(UPDATED_AT_FIELD, stamp);

        let outcome = self
            .collection
            .update_many(selector.to_document(), doc! { "$set": fields })
            .await
            .map_err(write_error("update_attributes"))?;

        debug!(matched = outcome.matched, modified = outcome.modified, "update_many finished");
        Ok(())
    }

    /// Remove the document whose `_id` equals `id`, if there is one.
    #[instrument(skip_all, fields(collection = %self.collection.name()))]
    pub async fn delete(&self, id: impl Into<Bson>) -> Result<(), StoreError> {
        let id = id.into();
        let deleted = self
            .collection
            .delete_one(Selector::by_id(id.clone()).to_document())
            .await
            .map_err(write_error("delete"))?;
        debug!(%id, deleted, "delete_one finished");
        Ok(())
    }

    /// Remove every document matching `selector`. An empty selector empties
    /// the collection.
    #[instrument(skip_all, fields(collection = %self.collection.name(), predicates = selector.len()))]
    pub async fn delete_range(&self, selector: &Selector) -> Result<(), StoreError> {
        let deleted = self
            .collection
            .delete_many(selector.to_document())
            .await
            .map_err(write_error("delete_range"))?;
        debug!(deleted, "delete_many finished");
        Ok(())
    }

    /// Every record in the collection.
    ///
    /// One undecodable document fails the whole call with
    /// [`StoreError::Decoding`].
    #[instrument(skip_all, fields(collection = %self.collection.name()))]
    pub async fn list_all(&self) -> Result<Vec<T>, StoreError> {
        self.find_many("list_all", Document::new()).await
    }

    /// Every record matching `selector`; empty when nothing matches.
    #[instrument(skip_all, fields(collection = %self.collection.name(), predicates = selector.len()))]
    pub async fn list(&self, selector: &Selector) -> Result<Vec<T>, StoreError> {
        self.find_many("list", selector.to_document()).await
    }

    /// Create the index described by `spec` and return its name.
    #[instrument(skip_all, fields(collection = %self.collection.name(), unique = spec.is_unique()))]
    pub async fn create_index(&self, spec: &IndexSpec) -> Result<String, StoreError> {
        if spec.is_empty() {
            return Err(StoreError::Write {
                operation: "create_index",
                source: BackendError::Invalid("index must name at least one field".into()),
            });
        }

        let name = self
            .collection
            .create_index(spec)
            .await
            .map_err(write_error("create_index"))?;
        debug!(index = %name, "create_index finished");
        Ok(name)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    async fn find_one(&self, operation: &'static str, filter: Document) -> Result<T, StoreError> {
        let document = self
            .collection
            .find_one(filter)
            .await
            .map_err(|source| StoreError::Read { operation, source })?
            .ok_or(StoreError::NotFound { operation })?;
        decode(operation, document)
    }

    async fn find_many(
        &self,
        operation: &'static str,
        filter: Document,
    ) -> Result<Vec<T>, StoreError> {
        debug!("find started");
        let documents = self
            .collection
            .find(filter)
            .await
            .map_err(|source| StoreError::Read { operation, source })?;

        let records = documents
            .into_iter()
            .map(|document| decode(operation, document))
            .collect::<Result<Vec<T>, _>>()?;
        debug!(count = records.len(), "find finished");
        Ok(records)
    }
}

impl<T, C: Clone> Clone for RecordController<T, C> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            _record: PhantomData,
        }
    }
}

impl<T, C: DocumentCollection> fmt::Debug for RecordController<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordController")
            .field("collection", &self.collection.name())
            .field("record", &std::any::type_name::<T>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

fn encode<T: Serialize>(operation: &'static str, record: &T) -> Result<Document, StoreError> {
    bson::to_document(record).map_err(|source| StoreError::Serialization { operation, source })
}

fn decode<T: Record>(operation: &'static str, document: Document) -> Result<T, StoreError> {
    bson::from_document(document).map_err(|source| StoreError::Decoding { operation, source })
}

fn write_error(operation: &'static str) -> impl Fn(BackendError) -> StoreError {
    move |source| StoreError::Write { operation, source }
}
