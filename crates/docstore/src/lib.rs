//! `docstore` crate: generic data access over a document database.
//!
//! [`connect`] returns a MongoDB database handle. [`RecordController`] binds
//! one collection to one [`Record`] type and translates create / get / find /
//! exists / update / delete / list / index calls into single round trips
//! against a [`DocumentCollection`]. [`MongoCollection`] talks to MongoDB;
//! [`MemoryCollection`] keeps documents in process.

pub mod collection;
pub mod config;
pub mod connection;
pub mod controller;
pub mod error;
pub mod filter;
pub mod index;
pub mod memory;
pub mod mongo;
pub mod record;

pub use collection::{DocumentCollection, UpdateOutcome};
pub use config::StoreConfig;
pub use connection::{connect, connect_with};
pub use controller::RecordController;
pub use error::{BackendError, StoreError};
pub use filter::{Attributes, Selector};
pub use index::{Direction, IndexSpec};
pub use memory::MemoryCollection;
pub use mongo::MongoCollection;
pub use record::Record;

// Used by `timestamped_record!` expansions.
#[doc(hidden)]
pub use bson;
#[doc(hidden)]
pub use chrono;
