mod document;

use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};

pub use document::{JsonDocument, JsonStore, StoreGuard};

use crate::error::Result;

/// A shared handle on one of the application's JSON documents.
pub struct Store<T>(Arc<JsonStore<T>>);

impl<T> Store<T>
where
    T: JsonDocument,
{
    /// Open the document under the given data directory.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        Ok(Self(Arc::new(JsonStore::open(data_dir).await?)))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Store<T> {
    type Target = JsonStore<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Store<T>
where
    T: JsonDocument,
{
    type Error = ();

    /// Get the store from managed state.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.rocket().state::<Store<T>>() {
            Some(store) => request::Outcome::Success(store.clone()),
            None => {
                error!("Store for {} is not managed", T::FILE_NAME);
                request::Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}
