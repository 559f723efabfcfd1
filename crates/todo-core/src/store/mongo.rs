//! MongoDB todo collection
//!
//! Documents are stored as `{_id: ObjectId, completed: bool, body: string}`.
//! Each store operation issues exactly one driver call; there are no
//! transactions and no retries beyond what the driver does on its own.

use super::TodoStore;
use crate::config::MongoConfig;
use crate::todo::{validate_body, Todo};
use crate::{Error, Result};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::{ClientOptions, ReturnDocument};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Object id that serializes as its 24 character hex form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectIdHex(pub ObjectId);

impl ObjectIdHex {
    /// Parse a 24 character hex id (either case)
    pub fn parse(raw: &str) -> Result<Self> {
        ObjectId::parse_str(raw)
            .map(ObjectIdHex)
            .map_err(|_| Error::InvalidIdentifier(raw.to_string()))
    }
}

impl fmt::Display for ObjectIdHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

impl Serialize for ObjectIdHex {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_hex())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TodoDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    #[serde(default)]
    completed: bool,
    body: String,
}

impl From<TodoDocument> for Todo<ObjectIdHex> {
    fn from(doc: TodoDocument) -> Self {
        Todo {
            id: ObjectIdHex(doc.id),
            completed: doc.completed,
            body: doc.body,
        }
    }
}

/// Todos in a MongoDB collection
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    collection: Collection<TodoDocument>,
}

impl MongoStore {
    /// Build a client from the connection string
    ///
    /// The driver connects lazily, so an unreachable server only shows up on
    /// the first operation; call [`TodoStore::ping`] to check eagerly.
    pub async fn connect(config: &MongoConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| Error::Config(format!("invalid MONGODB_URI: {}", e)))?;
        options.app_name.get_or_insert_with(|| "todo-api".to_string());

        let client = Client::with_options(options)?;
        log::debug!(
            "mongodb client ready for {}.{}",
            config.database,
            config.collection
        );
        Ok(Self::with_client(client, &config.database, &config.collection))
    }

    /// Use an existing client
    pub fn with_client(client: Client, database: &str, collection: &str) -> Self {
        let collection = client.database(database).collection(collection);
        Self { client, collection }
    }
}

#[async_trait]
impl TodoStore for MongoStore {
    type Id = ObjectIdHex;

    fn name(&self) -> &'static str {
        "mongodb"
    }

    fn parse_id(&self, raw: &str) -> Result<ObjectIdHex> {
        ObjectIdHex::parse(raw)
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Todo<ObjectIdHex>>> {
        let cursor = self.collection.find(doc! {}).await?;
        let docs: Vec<TodoDocument> = cursor.try_collect().await?;
        Ok(docs.into_iter().map(Todo::from).collect())
    }

    async fn create(&self, body: String) -> Result<Todo<ObjectIdHex>> {
        validate_body(&body)?;

        let document = TodoDocument {
            id: ObjectId::new(),
            completed: false,
            body,
        };
        self.collection.insert_one(&document).await?;
        Ok(document.into())
    }

    async fn complete(&self, id: &ObjectIdHex) -> Result<Todo<ObjectIdHex>> {
        self.collection
            .find_one_and_update(doc! { "_id": id.0 }, doc! { "$set": { "completed": true } })
            .return_document(ReturnDocument::After)
            .await?
            .map(Todo::from)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &ObjectIdHex) -> Result<()> {
        let result = self.collection.delete_one(doc! { "_id": id.0 }).await?;
        if result.deleted_count == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }
}
