//! Integration tests for the reference backend server, run in-process
//! against an ephemeral data directory and a real bound TCP listener
//! (spec.md §6 "Backend client interface", §8 scenario S8).
//!
//! The teacher's original version of this file hit a hardcoded
//! `http://127.0.0.1:8080` and required a manually-started server; this
//! spawns `handlers::app` on an OS-assigned port per test so the suite
//! is self-contained.

use reqwest::{Client, StatusCode};
use tempfile::TempDir;

use remotefs_backend_http::handlers;

/// Binds the app router to an ephemeral port and spawns it, returning
/// the base URL and a guard that keeps the backing directory alive.
async fn spawn_server() -> (String, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let app = handlers::app(dir.path().to_path_buf());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), dir)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (base, _dir) = spawn_server().await;
    let response = reqwest::get(format!("{}/health", base)).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_list_root_directory() {
    let (base, _dir) = spawn_server().await;
    let response = reqwest::get(format!("{}/list", base)).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Vec<serde_json::Value> = response.json().await.expect("json body");
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_write_then_read_file() {
    let (base, _dir) = spawn_server().await;
    let client = Client::new();

    let put_response = client
        .put(format!("{}/files/new_file.txt", base))
        .body("New file content")
        .send()
        .await
        .expect("put");
    assert_eq!(put_response.status(), StatusCode::OK);

    let read_response = client.get(format!("{}/files/new_file.txt", base)).send().await.expect("get");
    assert_eq!(read_response.status(), StatusCode::OK);
    let body = read_response.text().await.expect("body");
    assert_eq!(body, "New file content");
}

#[tokio::test]
async fn test_overwrite_file() {
    let (base, _dir) = spawn_server().await;
    let client = Client::new();

    client
        .put(format!("{}/files/overwrite_test.txt", base))
        .body("Initial content")
        .send()
        .await
        .expect("put1");

    let overwrite_response = client
        .put(format!("{}/files/overwrite_test.txt", base))
        .body("Overwritten content")
        .send()
        .await
        .expect("put2");
    assert_eq!(overwrite_response.status(), StatusCode::OK);

    let read_response = client.get(format!("{}/files/overwrite_test.txt", base)).send().await.expect("get");
    let body = read_response.text().await.expect("body");
    assert_eq!(body, "Overwritten content");
}

#[tokio::test]
async fn test_create_list_and_delete_directory() {
    let (base, _dir) = spawn_server().await;
    let client = Client::new();

    let create_response = client.post(format!("{}/mkdir/test_delete_dir", base)).send().await.expect("mkdir");
    assert_eq!(create_response.status(), StatusCode::OK);

    let list_response = client.get(format!("{}/list/test_delete_dir", base)).send().await.expect("list");
    assert_eq!(list_response.status(), StatusCode::OK);
    let body: Vec<serde_json::Value> = list_response.json().await.expect("json body");
    assert!(body.is_empty());

    let delete_response = client.delete(format!("{}/dirs/test_delete_dir", base)).send().await.expect("rmdir");
    assert_eq!(delete_response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_delete_file() {
    let (base, _dir) = spawn_server().await;
    let client = Client::new();

    client
        .put(format!("{}/files/gone.txt", base))
        .body("bye")
        .send()
        .await
        .expect("put");

    let delete_response = client.delete(format!("{}/files/gone.txt", base)).send().await.expect("delete");
    assert_eq!(delete_response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_path_is_not_found() {
    let (base, _dir) = spawn_server().await;
    let client = Client::new();

    let response = client.get(format!("{}/files/non_existent_file.txt", base)).send().await.expect("get");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let delete_response = client
        .delete(format!("{}/files/non_existent_file.txt", base))
        .send()
        .await
        .expect("delete");
    assert_eq!(delete_response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rename_file() {
    let (base, _dir) = spawn_server().await;
    let client = Client::new();

    client
        .put(format!("{}/files/before.txt", base))
        .body("content")
        .send()
        .await
        .expect("put");

    let rename_response = client
        .post(format!("{}/rename/before.txt", base))
        .json(&serde_json::json!({ "to": "after.txt" }))
        .send()
        .await
        .expect("rename");
    assert_eq!(rename_response.status(), StatusCode::OK);

    let read_response = client.get(format!("{}/files/after.txt", base)).send().await.expect("get");
    assert_eq!(read_response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_truncate_and_chmod() {
    let (base, _dir) = spawn_server().await;
    let client = Client::new();

    client
        .put(format!("{}/files/sized.txt", base))
        .body("0123456789")
        .send()
        .await
        .expect("put");

    let truncate_response = client
        .post(format!("{}/truncate/sized.txt", base))
        .query(&[("size", "4")])
        .send()
        .await
        .expect("truncate");
    assert_eq!(truncate_response.status(), StatusCode::OK);

    let read_response = client.get(format!("{}/files/sized.txt", base)).send().await.expect("get");
    assert_eq!(read_response.text().await.unwrap(), "0123");

    let chmod_response = client
        .post(format!("{}/chmod/sized.txt", base))
        .query(&[("mode", "416")])
        .send()
        .await
        .expect("chmod");
    assert_eq!(chmod_response.status(), StatusCode::OK);
}
