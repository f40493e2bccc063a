//! In-memory document storage backend for docmap.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It follows the document store's write semantics (identity conflicts, upserts seeded from
//! filters, atomic single-document updates), which makes it the reference backend for tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads, serialized writes using an async-aware RwLock
//! - **Store semantics** - Duplicate identities conflict, updates count modified documents
//! - **Full query support** - Filtering, sorting, pagination and projection
//!
//! # Quick Start
//!
//! ```ignore
//! use docmap::{Document, DocumentStore, Instance, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Document)]
//! #[serde(default)]
//! pub struct User {
//!     #[document(primary_key)]
//!     pub name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let store = DocumentStore::new(backend);
//!     let users = store.typed_collection::<User>();
//!
//!     Instance::new(User { name: "Alice".into() }).save(&users, true).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
