//! Todo entity and its wire format

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A todo as stored and as sent to clients
///
/// `I` is the identifier type of the store that produced it: `u64` for the
/// in-memory store, an object id rendered as hex for MongoDB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Todo<I> {
    pub id: I,
    pub completed: bool,
    pub body: String,
}

impl<I> Todo<I> {
    /// A fresh, not yet completed todo
    pub fn pending(id: I, body: String) -> Self {
        Self {
            id,
            completed: false,
            body,
        }
    }
}

/// Create request payload
///
/// Only `body` is read. Client supplied `id` and `completed` are dropped
/// along with any unknown field, and a missing `body` decodes as empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewTodo {
    pub body: String,
}

impl NewTodo {
    /// Reject empty bodies before anything touches the store
    pub fn validate(&self) -> Result<()> {
        validate_body(&self.body)
    }
}

/// Body check shared by every store's `create`
pub fn validate_body(body: &str) -> Result<()> {
    if body.is_empty() {
        return Err(Error::Validation("Body is required".to_string()));
    }
    Ok(())
}

/// Reply for PATCH and DELETE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Success {
    pub success: bool,
}

impl Success {
    pub const OK: Success = Success { success: true };
}
