//! End-to-end tests against a real listener

use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use todo_core::{Error, MemoryStore, Server, ServerConfig};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct TestServer {
    base: String,
    client: reqwest::Client,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<todo_core::Result<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let config = ServerConfig {
            port: 0,
            hostname: "127.0.0.1".to_string(),
            shutdown_timeout: Duration::from_secs(2),
            ..ServerConfig::default()
        };
        let server = Server::bind(&config, Arc::new(MemoryStore::new()))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();

        let (stop, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(async {
            let _ = rx.await;
        }));

        Self {
            base: format!("http://{}/api/todos", addr),
            client: reqwest::Client::new(),
            stop,
            handle,
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}{}", self.base, suffix)
    }

    async fn list(&self) -> Value {
        let res = self.client.get(self.url("")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        res.json().await.unwrap()
    }

    async fn stop(self) {
        self.stop.send(()).unwrap();
        self.handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_todo_lifecycle() {
    let server = TestServer::start().await;

    let res = server
        .client
        .post(server.url(""))
        .json(&json!({"body": "buy milk"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert!(res.headers().contains_key("x-request-id"));
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["completed"], json!(false));
    assert_eq!(created["body"], json!("buy milk"));
    let id = created["id"].as_u64().unwrap();

    let res = server
        .client
        .patch(server.url(&format!("/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({"success": true}));

    assert_eq!(
        server.list().await,
        json!([{"id": id, "completed": true, "body": "buy milk"}])
    );

    let res = server
        .client
        .delete(server.url(&format!("/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(server.list().await, json!([]));

    let res = server
        .client
        .delete(server.url(&format!("/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    server.stop().await;
}

#[tokio::test]
async fn test_client_errors() {
    let server = TestServer::start().await;

    let res = server
        .client
        .post(server.url(""))
        .json(&json!({"body": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({"error": "Body is required"})
    );

    let res = server
        .client
        .post(server.url(""))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server.client.patch(server.url("/not-an-id")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server.client.patch(server.url("/12345")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server.client.put(server.url("")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers()["allow"], "GET, POST");

    assert_eq!(server.list().await, json!([]));
    server.stop().await;
}

#[tokio::test]
async fn test_ids_stay_unique_across_deletes() {
    let server = TestServer::start().await;

    let mut ids = Vec::new();
    for body in ["a", "b", "c"] {
        let created: Value = server
            .client
            .post(server.url(""))
            .json(&json!({ "body": body }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        ids.push(created["id"].as_u64().unwrap());
    }

    server
        .client
        .delete(server.url(&format!("/{}", ids[1])))
        .send()
        .await
        .unwrap();

    let created: Value = server
        .client
        .post(server.url(""))
        .json(&json!({"body": "d"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let new_id = created["id"].as_u64().unwrap();
    assert!(!ids.contains(&new_id));

    let listed: Vec<u64> = server
        .list()
        .await
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_u64().unwrap())
        .collect();
    assert_eq!(listed, vec![ids[0], ids[2], new_id]);

    server.stop().await;
}

#[tokio::test]
async fn test_port_in_use_fails_to_bind() {
    let server = TestServer::start().await;
    let port = server
        .base
        .trim_start_matches("http://127.0.0.1:")
        .split('/')
        .next()
        .unwrap()
        .parse::<u16>()
        .unwrap();

    let config = ServerConfig {
        port,
        hostname: "127.0.0.1".to_string(),
        ..ServerConfig::default()
    };
    let second = Server::bind(&config, Arc::new(MemoryStore::new())).await;
    assert!(matches!(second, Err(Error::Io(_))));

    server.stop().await;
}
