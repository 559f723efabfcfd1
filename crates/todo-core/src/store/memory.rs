//! In-process todo list

use super::TodoStore;
use crate::todo::{validate_body, Todo};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

#[derive(Debug)]
struct Inner {
    todos: Vec<Todo<u64>>,
    /// Last id handed out. Only grows, so ids freed by delete are never reused.
    last_id: u64,
}

/// Todos kept in insertion order behind a mutex
///
/// Contents are lost when the process exits.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                todos: Vec::new(),
                last_id: 0,
            }),
        }
    }

    /// Number of stored todos
    pub fn len(&self) -> usize {
        self.inner.lock().todos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    type Id = u64;

    fn name(&self) -> &'static str {
        "memory"
    }

    /// Only canonical decimal is accepted, so `+1` and `01` never alias todo 1
    fn parse_id(&self, raw: &str) -> Result<u64> {
        match raw.parse::<u64>() {
            Ok(id) if id.to_string() == raw => Ok(id),
            _ => Err(Error::InvalidIdentifier(raw.to_string())),
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Todo<u64>>> {
        Ok(self.inner.lock().todos.clone())
    }

    async fn create(&self, body: String) -> Result<Todo<u64>> {
        validate_body(&body)?;

        let mut inner = self.inner.lock();
        inner.last_id += 1;
        let todo = Todo::pending(inner.last_id, body);
        inner.todos.push(todo.clone());
        Ok(todo)
    }

    async fn complete(&self, id: &u64) -> Result<Todo<u64>> {
        let mut inner = self.inner.lock();
        let todo = inner
            .todos
            .iter_mut()
            .find(|t| t.id == *id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        todo.completed = true;
        Ok(todo.clone())
    }

    async fn delete(&self, id: &u64) -> Result<()> {
        let mut inner = self.inner.lock();
        let index = inner
            .todos
            .iter()
            .position(|t| t.id == *id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        inner.todos.remove(index);
        Ok(())
    }
}
