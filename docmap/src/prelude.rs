//! Convenient re-exports of commonly used types from docmap.
//!
//! ```ignore
//! use docmap::prelude::*;
//! ```
//!
//! This brings in the `Document` trait and derive, instances, collections, filters, update
//! expressions, bulk scopes, backend traits, result and error types, and the `doc!` macro.

pub use bson::{Bson, doc};
pub use docmap_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    bulk::BulkScope,
    collection::{FindAndModify, InstanceStream, TypedCollection},
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    filter::{Field, FieldOp, Filter, Query, QueryBuilder, Sort, SortDirection},
    instance::Instance,
    result::WriteResult,
    store::{DocumentStore, DynDocumentStore, DynTypedCollection},
    update::{AtomicOp, UpdateExpr, UpdateOptions},
};
pub use docmap_macros::Document;
pub use futures::{StreamExt, TryStreamExt};
