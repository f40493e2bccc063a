//! MongoDB backend implementation for docmap.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait on the
//! official async driver. Filters are translated into MongoDB queries, atomic updates are sent
//! as update operator documents, and find-and-modify runs as a single `findOneAndUpdate` or
//! `findOneAndDelete` command.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docmap = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! Duplicate key errors (server code 11000) surface as
//! `DocumentStoreError::WriteConflict`. Every other driver error surfaces as
//! `DocumentStoreError::Backend` and is never retried.
//!
//! # Example
//!
//! ```ignore
//! use docmap::{backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .app_name("inventory")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap_mongodb;

pub mod filter;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
