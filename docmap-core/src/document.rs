//! Core traits for mapping typed values to store documents.
//!
//! A [`Document`] is any serde-compatible type that names its collection and the field that
//! holds its primary key. [`DocumentExt`] adds the conversions the mapper needs, and is
//! implemented for every `Document` automatically.

use bson::{
    Bson, Document as BsonDocument,
    de::deserialize_from_document,
    ser::serialize_to_document,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value, to_value};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Name of the identity field in the underlying store.
///
/// The primary key field of a [`Document`] is stored under this name and renamed back when the
/// document is loaded.
pub const STORE_KEY_FIELD: &str = "_id";

/// Core trait that all mapped documents must implement.
///
/// Implement it by hand or with `#[derive(Document)]` from the `docmap` crate.
///
/// Types that are loaded through a projection (see
/// [`FindAndModify::fields`](crate::collection::FindAndModify::fields)) must deserialize with
/// missing fields, typically by putting `#[serde(default)]` on the struct.
///
/// # Example
///
/// ```ignore
/// use docmap::document::Document;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// #[serde(default)]
/// pub struct User {
///     pub email: String,
///     pub name: Option<String>,
///     pub logins: i64,
/// }
///
/// impl Document for User {
///     fn collection_name() -> &'static str {
///         "users"
///     }
///
///     fn primary_key_field() -> &'static str {
///         "email"
///     }
/// }
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;

    /// Returns the name of the field holding the primary key.
    ///
    /// The value of this field must be unique within the collection and is always assigned by
    /// the caller.
    fn primary_key_field() -> &'static str;
}

/// Extension trait providing conversions for documents.
pub trait DocumentExt: Document {
    /// Serializes this document into its field map, using model field names.
    fn to_fields(&self) -> DocumentStoreResult<BsonDocument>;

    /// Deserializes a document from a field map using model field names.
    fn from_fields(fields: BsonDocument) -> DocumentStoreResult<Self>;

    /// Returns the primary key value of this document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the key is absent or null.
    fn primary_key(&self) -> DocumentStoreResult<Bson>;

    /// Converts this document to a JSON value.
    fn to_json(&self) -> DocumentStoreResult<Value>;

    /// Creates a document from a JSON value.
    fn from_json(value: Value) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_fields(&self) -> DocumentStoreResult<BsonDocument> {
        Ok(serialize_to_document(self)?)
    }

    fn from_fields(fields: BsonDocument) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_document(fields)?)
    }

    fn primary_key(&self) -> DocumentStoreResult<Bson> {
        key_of::<D>(&self.to_fields()?)
    }

    fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> DocumentStoreResult<Self> {
        Ok(from_value(value)?)
    }
}

pub(crate) fn key_of<D: Document>(fields: &BsonDocument) -> DocumentStoreResult<Bson> {
    match fields.get(D::primary_key_field()) {
        None | Some(Bson::Null) => Err(DocumentStoreError::InvalidDocument(format!(
            "document for collection {} has no value for primary key field '{}'",
            D::collection_name(),
            D::primary_key_field(),
        ))),
        Some(key) => Ok(key.clone()),
    }
}
