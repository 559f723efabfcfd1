//! Todo storage back-ends
//!
//! Every back-end implements [`TodoStore`]; the API layer is generic over it
//! and never sees which one is running.

mod memory;
#[cfg(feature = "mongodb")]
mod mongo;

pub use memory::MemoryStore;
#[cfg(feature = "mongodb")]
pub use mongo::{MongoStore, ObjectIdHex};

use crate::todo::Todo;
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::{Debug, Display};

/// Persistence for todos
#[async_trait]
pub trait TodoStore: Send + Sync + 'static {
    /// Identifier assigned by this store
    type Id: Clone + Debug + Display + Serialize + Send + Sync + 'static;

    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Parse an identifier from a path segment
    ///
    /// Fails with [`Error::InvalidIdentifier`](crate::Error::InvalidIdentifier)
    /// when `raw` cannot be an id of this store at all.
    fn parse_id(&self, raw: &str) -> Result<Self::Id>;

    /// Check that the backing store answers
    async fn ping(&self) -> Result<()>;

    /// All todos in store order
    async fn list(&self) -> Result<Vec<Todo<Self::Id>>>;

    /// Persist a new pending todo and return it with its id
    async fn create(&self, body: String) -> Result<Todo<Self::Id>>;

    /// Mark a todo completed and return the updated record
    async fn complete(&self, id: &Self::Id) -> Result<Todo<Self::Id>>;

    /// Remove a todo
    async fn delete(&self, id: &Self::Id) -> Result<()>;
}
