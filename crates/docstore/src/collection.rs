//! The `DocumentCollection` trait, the seam between the record controller
//! and a concrete store.
//!
//! Implementations work on raw BSON documents; encoding to and from record
//! types happens in the controller.

use async_trait::async_trait;
use bson::Document;

use crate::{BackendError, IndexSpec};

/// Counts reported by an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents that matched the filter.
    pub matched: u64,
    /// Documents whose content actually changed.
    pub modified: u64,
}

/// One named collection of documents.
///
/// Every method is a single round trip; implementations must be safe to call
/// from many tasks at once.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    fn name(&self) -> &str;

    async fn insert_one(&self, document: Document) -> Result<(), BackendError>;

    /// First document matching `filter`, if any.
    async fn find_one(&self, filter: Document) -> Result<Option<Document>, BackendError>;

    /// Every document matching `filter`.
    async fn find(&self, filter: Document) -> Result<Vec<Document>, BackendError>;

    /// Apply `update` (an operator document such as `{ $set: {...} }`) to the
    /// first match.
    async fn update_one(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, BackendError>;

    /// Apply `update` to every match.
    async fn update_many(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, BackendError>;

    /// Returns the number of documents deleted (0 or 1).
    async fn delete_one(&self, filter: Document) -> Result<u64, BackendError>;

    async fn delete_many(&self, filter: Document) -> Result<u64, BackendError>;

    /// Create the index and return its name.
    async fn create_index(&self, spec: &IndexSpec) -> Result<String, BackendError>;
}
