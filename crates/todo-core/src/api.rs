//! Todo REST endpoints
//!
//! | Method | Path | Store call | Success |
//! |---|---|---|---|
//! | GET | `/api/todos` | `list` | 200, array of todos |
//! | POST | `/api/todos` | `create` | 201, the new todo |
//! | PATCH | `/api/todos/:id` | `complete` | 200, `{"success":true}` |
//! | DELETE | `/api/todos/:id` | `delete` | 200, `{"success":true}` |

use crate::store::TodoStore;
use crate::todo::{NewTodo, Success};
use crate::{Error, Method, Request, Response, Result, StatusCode};
use std::sync::Arc;
use todo_router::Router;

/// Endpoints of the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ListTodos,
    CreateTodo,
    CompleteTodo,
    DeleteTodo,
}

impl Route {
    pub const ALL: [Route; 4] = [
        Route::ListTodos,
        Route::CreateTodo,
        Route::CompleteTodo,
        Route::DeleteTodo,
    ];

    pub fn method(&self) -> &'static str {
        match self {
            Route::ListTodos => "GET",
            Route::CreateTodo => "POST",
            Route::CompleteTodo => "PATCH",
            Route::DeleteTodo => "DELETE",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::ListTodos | Route::CreateTodo => "/api/todos",
            Route::CompleteTodo | Route::DeleteTodo => "/api/todos/:id",
        }
    }
}

/// Router with every [`Route`] registered
pub fn routes() -> Router<Route> {
    let mut router = Router::new();
    for route in Route::ALL {
        router.insert(route.method(), route.path(), route);
    }
    router
}

/// Maps HTTP requests onto a [`TodoStore`]
pub struct TodoApi<S> {
    store: Arc<S>,
    router: Router<Route>,
}

impl<S: TodoStore> TodoApi<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            router: routes(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Handle a request, turning every error into its JSON response
    ///
    /// Route params are written back into `req` for the middleware that
    /// runs afterwards.
    pub async fn handle(&self, req: &mut Request) -> Response {
        match self.dispatch(req).await {
            Ok(res) => res,
            Err(err) => {
                if err.status_code().is_server_error() {
                    log::error!("{} store: {}", self.store.name(), err);
                }
                Response::error(&err)
            }
        }
    }

    async fn dispatch(&self, req: &mut Request) -> Result<Response> {
        if let Method::Other(name) = &req.method {
            return Err(Error::InvalidMethod(name.clone()));
        }
        let method = req.method.as_str();
        let Some(matched) = self.router.find(method, &req.path) else {
            let allowed = self.router.allowed_methods(&req.path);
            if allowed.is_empty() {
                return Err(Error::RouteNotFound {
                    method: method.to_string(),
                    path: req.path.clone(),
                });
            }
            return Err(Error::MethodNotAllowed {
                method: method.to_string(),
                allowed: allowed.into_iter().map(String::from).collect(),
                path: req.path.clone(),
            });
        };
        req.params = matched.params_map();

        match matched.value {
            Route::ListTodos => self.list_todos().await,
            Route::CreateTodo => self.create_todo(req).await,
            Route::CompleteTodo => self.complete_todo(req).await,
            Route::DeleteTodo => self.delete_todo(req).await,
        }
    }

    async fn list_todos(&self) -> Result<Response> {
        let todos = self.store.list().await?;
        Response::json_value(StatusCode::OK, &todos)
    }

    async fn create_todo(&self, req: &Request) -> Result<Response> {
        let new: NewTodo = req.json()?;
        new.validate()?;
        let todo = self.store.create(new.body).await?;
        log::debug!("created todo {}", todo.id);
        Response::json_value(StatusCode::CREATED, &todo)
    }

    async fn complete_todo(&self, req: &Request) -> Result<Response> {
        let id = self.path_id(req)?;
        self.store.complete(&id).await?;
        Response::json_value(StatusCode::OK, &Success::OK)
    }

    async fn delete_todo(&self, req: &Request) -> Result<Response> {
        let id = self.path_id(req)?;
        self.store.delete(&id).await?;
        Response::json_value(StatusCode::OK, &Success::OK)
    }

    fn path_id(&self, req: &Request) -> Result<S::Id> {
        let raw = req
            .param("id")
            .ok_or_else(|| Error::InvalidIdentifier(String::new()))?;
        self.store.parse_id(raw)
    }
}
