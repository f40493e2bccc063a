//! Main document store interface.
//!
//! [`DocumentStore`] owns a backend and hands out [`TypedCollection`] handles. For runtime
//! backend selection, [`DocumentStore::into_dyn`] erases the backend type into a
//! [`DynDocumentStore`].
//!
//! # Example
//!
//! ```ignore
//! use docmap::store::DocumentStore;
//!
//! let store = DocumentStore::new(backend);
//! let users = store.typed_collection::<User>();
//! ```

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    collection::TypedCollection,
    document::Document,
    error::DocumentStoreResult,
};

/// A document store whose backend type is erased.
pub type DynDocumentStore = DocumentStore<Box<dyn DynStoreBackend>>;

/// A typed collection on a [`DynDocumentStore`].
pub type DynTypedCollection<'a, D> = TypedCollection<'a, Box<dyn DynStoreBackend>, D>;

/// A document store bound to a specific backend implementation.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gets a handle on the collection of document type `D`.
    ///
    /// Each call returns a new handle with its own bulk buffer.
    pub fn typed_collection<'a, D: Document>(&'a self) -> TypedCollection<'a, B, D> {
        TypedCollection::new(&self.backend)
    }

    /// Creates a new collection with the given name.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection already exists or creation fails.
    pub async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::create_collection(&self.backend, name).await
    }

    /// Drops a collection and its documents.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_collection(&self.backend, name).await
    }

    /// Lists all collections in the store.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_collections(&self.backend).await
    }

    /// Shuts down the store and releases backend resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(self.backend).await
    }
}

impl<B: StoreBackend + 'static> DocumentStore<B> {
    /// Erases the backend type.
    pub fn into_dyn(self) -> DynDocumentStore {
        DocumentStore::new(Box::new(self.backend) as Box<dyn DynStoreBackend>)
    }
}

impl DynDocumentStore {
    /// Returns the backend as its concrete type, if it is a `T`.
    pub fn backend_as<T: StoreBackend + 'static>(&self) -> Option<&T> {
        DynStoreBackend::as_any(&*self.backend).downcast_ref::<T>()
    }
}
