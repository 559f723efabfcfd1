//! todo-core: Todo REST API over pluggable stores
//!
//! Four endpoints under `/api/todos` (list, create, complete, delete)
//! backed by any [`TodoStore`]. The store is built once at startup and
//! handed to the server; there is no global state.
//!
//! ## Features
//! - `mongodb` - MongoDB-backed store ([`store::MongoStore`])

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod store;
pub mod todo;

// Re-exports
pub use api::{Route, TodoApi};
pub use config::{Config, MongoConfig, ServerConfig, StoreConfig};
pub use error::{Error, Result};
pub use request::{Method, Request, RequestBuilder};
pub use response::{Response, ResponseBuilder, StatusCode};
pub use server::{Server, ServerState};
pub use store::{MemoryStore, TodoStore};
pub use todo::{NewTodo, Success, Todo};

#[cfg(feature = "mongodb")]
pub use store::{MongoStore, ObjectIdHex};
