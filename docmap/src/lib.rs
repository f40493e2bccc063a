//! Main docmap crate providing a typed document mapper over schemaless document stores.
//!
//! This crate is the primary entry point for users of docmap. It re-exports the core types
//! from the sub-crates, the `Document` derive macro, and the available storage backends.
//!
//! # Features
//!
//! - **Typed documents** - Derive `Document` on a Serde struct and name its primary key field
//! - **Instances** - Save, reload, delete and atomic operators that keep local state in step
//! - **Collections** - Count, find, multi-document update, remove and find-and-modify
//! - **Bulk writes** - Buffer writes in a scope, flush on commit, discard on drop
//! - **Multiple backends** - In-memory and MongoDB storage behind one backend trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmap::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Document)]
//! #[document(collection = "users")]
//! #[serde(default)]
//! pub struct User {
//!     #[document(primary_key)]
//!     pub email: String,
//!     pub logins: i64,
//!     pub tags: Vec<String>,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let users = store.typed_collection::<User>();
//!
//!     // Insert, then apply atomic operators to the stored and the local copy at once
//!     let mut ada = Instance::new(User { email: "ada@example.com".into(), ..Default::default() });
//!     ada.save(&users, true).await?;
//!     ada.inc(&users, doc! { "logins": 1 }).await?;
//!     ada.add_to_set(&users, doc! { "tags": "admin" }).await?;
//!     assert_eq!(ada.logins, 1);
//!
//!     // Multi-document update
//!     users
//!         .update(
//!             Field::new("logins").lt(5),
//!             UpdateExpr::new().push(doc! { "tags": "new" }),
//!             UpdateOptions::default(),
//!         )
//!         .await?;
//!
//!     // Buffered writes
//!     let scope = users.bulk()?;
//!     for n in 0..10 {
//!         Instance::new(User { email: format!("user{n}@example.com"), ..Default::default() })
//!             .bulk_save(&users)?;
//!     }
//!     scope.commit().await?;
//!
//!     assert_eq!(users.count(Filter::all()).await?, 11);
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! A `DocumentStore` can be converted into a [`DynDocumentStore`](store::DynDocumentStore)
//! with `into_dyn` when the backend is picked at runtime:
//!
//! ```ignore
//! let store: DynDocumentStore = DocumentStore::new(InMemoryStore::builder().build().await?).into_dyn();
//! let users = store.typed_collection::<User>();
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires the `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as docmap;

pub mod prelude;

pub use docmap_core::{
    backend, bulk, collection, document, error, filter, gateway, instance, result, store, update,
};
pub use docmap_macros::Document;

// Re-exported so that user code and generated code agree on one version.
pub use bson;
pub use futures;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmap_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmap_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
