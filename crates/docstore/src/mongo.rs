//! [`DocumentCollection`] backed by a MongoDB collection.

use async_trait::async_trait;
use bson::Document;
use futures::TryStreamExt;
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};

use crate::{BackendError, DocumentCollection, IndexSpec, UpdateOutcome};

/// A MongoDB collection handle. Cheap to clone; clones share the client.
#[derive(Debug, Clone)]
pub struct MongoCollection {
    inner: Collection<Document>,
}

impl MongoCollection {
    pub fn new(inner: Collection<Document>) -> Self {
        Self { inner }
    }

    /// Handle for the collection `name` in `database`. Nothing is created on
    /// the server until the first write.
    pub fn from_database(database: &Database, name: &str) -> Self {
        Self::new(database.collection::<Document>(name))
    }

    pub fn inner(&self) -> &Collection<Document> {
        &self.inner
    }
}

impl From<Collection<Document>> for MongoCollection {
    fn from(inner: Collection<Document>) -> Self {
        Self::new(inner)
    }
}

#[async_trait]
impl DocumentCollection for MongoCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn insert_one(&self, document: Document) -> Result<(), BackendError> {
        self.inner.insert_one(document, None).await?;
        Ok(())
    }

    async fn find_one(&self, filter: Document) -> Result<Option<Document>, BackendError> {
        Ok(self.inner.find_one(filter, None).await?)
    }

    async fn find(&self, filter: Document) -> Result<Vec<Document>, BackendError> {
        let cursor = self.inner.find(filter, None).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(documents)
    }

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, BackendError> {
        let result = self.inner.update_one(filter, update, None).await?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn update_many(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome, BackendError> {
        let result = self.inner.update_many(filter, update, None).await?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(&self, filter: Document) -> Result<u64, BackendError> {
        Ok(self.inner.delete_one(filter, None).await?.deleted_count)
    }

    async fn delete_many(&self, filter: Document) -> Result<u64, BackendError> {
        Ok(self.inner.delete_many(filter, None).await?.deleted_count)
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<String, BackendError> {
        let model = IndexModel::builder()
            .keys(spec.keys_document())
            .options(IndexOptions::builder().unique(spec.is_unique()).build())
            .build();
        Ok(self.inner.create_index(model, None).await?.index_name)
    }
}
