//! A document-mapping layer between typed Rust values and a schemaless document store.
//!
//! This crate is the core of the docmap project and provides:
//!
//! - **Document traits** ([`document`]) - Mapping typed values to store documents
//! - **Instances** ([`instance`]) - Save, reload, delete and atomic operators on one document
//! - **Atomic updates** ([`update`]) - Update operators with matching remote and local semantics
//! - **Filters** ([`filter`]) - Filter expressions, sorting and queries handed to backends
//! - **Collections** ([`collection`]) - Count, find, update, remove and find-and-modify
//! - **Bulk writes** ([`bulk`]) - Write buffering with commit-on-success and discard-on-drop
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Document store** ([`store`]) - Entry point handing out collection handles
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docmap::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, Document)]
//! #[document(collection = "users")]
//! #[serde(default)]
//! pub struct User {
//!     #[document(primary_key)]
//!     pub email: String,
//!     pub logins: i64,
//! }
//!
//! let users = store.typed_collection::<User>();
//! let mut user = Instance::new(User { email: "ada@example.com".into(), logins: 0 });
//! user.save(&users, true).await?;
//! user.inc(&users, doc! { "logins": 1 }).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap_core;

pub mod backend;
pub mod bulk;
pub mod collection;
pub mod document;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod instance;
pub mod result;
pub mod store;
pub mod update;
