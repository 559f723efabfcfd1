//! todo-router: Zero-dependency segment trie HTTP router
//!
//! Maps `(method, path)` pairs onto an arbitrary route value. The todo
//! API registers an enum of its endpoints; tests use plain strings.
//!
//! ## Path Syntax
//! - `:name` - Named parameter (captures one segment)
//! - `*` or `*name` - Wildcard (captures remaining path)
//!
//! ## Priority
//! 1. Exact static match (highest)
//! 2. Parameter match
//! 3. Wildcard match (lowest)
//!
//! ## Example
//! ```
//! use todo_router::Router;
//!
//! let mut router = Router::new();
//! router.insert("GET", "/api/todos", "list");
//! router.insert("PATCH", "/api/todos/:id", "complete");
//!
//! let m = router.find("PATCH", "/api/todos/7").unwrap();
//! assert_eq!(m.value, "complete");
//! assert_eq!(m.param("id"), Some("7"));
//! assert_eq!(router.allowed_methods("/api/todos/7"), vec!["PATCH"]);
//! ```

use std::collections::{BTreeMap, HashMap};

/// Route match result
#[derive(Debug, Clone, PartialEq)]
pub struct Match<T> {
    /// The matched route value
    pub value: T,
    /// Captured path parameters as (name, value) pairs
    pub params: Vec<(String, String)>,
}

impl<T> Match<T> {
    /// Look up a captured parameter by name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get params as HashMap for convenient access
    pub fn params_map(&self) -> HashMap<String, String> {
        self.params.iter().cloned().collect()
    }
}

#[derive(Debug)]
struct Node<T> {
    children: HashMap<String, Node<T>>,
    param_child: Option<Box<ParamNode<T>>>,
    wildcard_child: Option<Box<WildcardNode<T>>>,
    value: Option<T>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            param_child: None,
            wildcard_child: None,
            value: None,
        }
    }
}

#[derive(Debug)]
struct ParamNode<T> {
    name: String,
    node: Node<T>,
}

#[derive(Debug)]
struct WildcardNode<T> {
    name: String,
    value: T,
}

/// Segment trie router
///
/// One trie per HTTP method. Lookups walk one path segment per level, so
/// matching costs O(k) in the number of segments.
#[derive(Debug)]
pub struct Router<T> {
    // BTreeMap keeps `allowed_methods` output stable
    trees: BTreeMap<String, Node<T>>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self {
            trees: BTreeMap::new(),
        }
    }
}

impl<T: Clone> Router<T> {
    /// Create a new router
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route
    ///
    /// Re-inserting the same method and path replaces the previous value.
    /// A parameter segment keeps the name it was first registered with.
    pub fn insert(&mut self, method: &str, path: &str, value: T) {
        let tree = self.trees.entry(method.to_uppercase()).or_default();
        let segments = split_path(path);
        Self::insert_node(tree, &segments, value);
    }

    fn insert_node(node: &mut Node<T>, segments: &[&str], value: T) {
        let Some((&segment, rest)) = segments.split_first() else {
            node.value = Some(value);
            return;
        };

        if let Some(name) = segment.strip_prefix(':') {
            let param = node.param_child.get_or_insert_with(|| {
                Box::new(ParamNode {
                    name: name.to_string(),
                    node: Node::default(),
                })
            });
            Self::insert_node(&mut param.node, rest, value);
        } else if let Some(name) = segment.strip_prefix('*') {
            let name = if name.is_empty() { "*" } else { name };
            node.wildcard_child = Some(Box::new(WildcardNode {
                name: name.to_string(),
                value,
            }));
        } else {
            let child = node.children.entry(segment.to_string()).or_default();
            Self::insert_node(child, rest, value);
        }
    }

    /// Find a matching route
    ///
    /// Returns the route value with captured params, or `None` if nothing
    /// is registered for this method and path.
    pub fn find(&self, method: &str, path: &str) -> Option<Match<T>> {
        let tree = self.trees.get(&method.to_uppercase())?;
        let segments = split_path(path);
        let mut params = Vec::new();
        Self::find_node(tree, &segments, &mut params)
    }

    fn find_node(
        node: &Node<T>,
        segments: &[&str],
        params: &mut Vec<(String, String)>,
    ) -> Option<Match<T>> {
        let Some((&segment, rest)) = segments.split_first() else {
            return node.value.clone().map(|value| Match {
                value,
                params: params.clone(),
            });
        };

        if let Some(child) = node.children.get(segment) {
            if let Some(m) = Self::find_node(child, rest, params) {
                return Some(m);
            }
        }

        if let Some(ref param) = node.param_child {
            params.push((param.name.clone(), segment.to_string()));
            if let Some(m) = Self::find_node(&param.node, rest, params) {
                return Some(m);
            }
            params.pop();
        }

        if let Some(ref wildcard) = node.wildcard_child {
            params.push((wildcard.name.clone(), segments.join("/")));
            return Some(Match {
                value: wildcard.value.clone(),
                params: params.clone(),
            });
        }

        None
    }

    /// Methods that have a route for `path`, in alphabetical order
    ///
    /// Used to tell "no such resource" (empty) apart from "wrong method".
    pub fn allowed_methods(&self, path: &str) -> Vec<&str> {
        self.trees
            .keys()
            .filter(|method| self.find(method, path).is_some())
            .map(String::as_str)
            .collect()
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
