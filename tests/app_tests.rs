#![cfg(feature = "web")]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use predictables::Settings;
use predictables::app::{AppContext, router};
use serde_json::{Value, json};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    dir: TempDir,
    router: Router,
}

fn app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();

    let rows: String = (0..5).map(|i| format!("{i},name{i}\n")).collect();
    fs::write(data_dir.join("iris.csv"), format!("id,name\n{rows}")).unwrap();
    fs::write(data_dir.join("breast_cancer.json"), r#"[{"r": 1}, {"r": 2}]"#).unwrap();

    let settings = Settings {
        chunk_dir: dir.path().join("chunks"),
        data_dir,
        users_file: dir.path().join("database/users.json"),
        ..Settings::default()
    };
    let ctx = Arc::new(AppContext::new(settings).unwrap());
    TestApp {
        router: router(ctx),
        dir,
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec(), cookie)
}

async fn call(app: &TestApp, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let (status, bytes, _) = send(app, request).await;
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn sample_data_defaults_to_split() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/v1/io/sample-data/breast-cancer", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"columns": ["r"], "index": [0, 1], "data": [[1], [2]]})
    );
}

#[tokio::test]
async fn sample_data_in_other_orients() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::GET,
        "/api/v1/io/sample-data/breast_cancer/records",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"r": 1}, {"r": 2}]));

    let (status, body) = call(&app, Method::GET, "/api/v1/io/sample-data/iris/table", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn unknown_dataset_is_404() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/v1/io/sample-data/wine", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().unwrap().contains("wine"));
}

#[tokio::test]
async fn lists_datasets_and_plans_chunks() {
    let app = app();
    let (_, body) = call(&app, Method::GET, "/api/v1/io/datasets", None).await;
    assert_eq!(body, json!({"datasets": ["breast_cancer", "iris"]}));

    let (status, body) = call(&app, Method::GET, "/api/v1/io/data/get-chunk-count/iris", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"dataset": "iris", "n_chunks": 20}));
}

#[tokio::test]
async fn chunking_is_idempotent() {
    let app = app();
    let uri = "/api/v1/io/data/chunk-dataset/iris?n_chunks=2";

    let (status, body) = call(&app, Method::POST, uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("written"));
    assert_eq!(body["n_chunks"], json!(2));
    assert_eq!(
        body["files"],
        json!(["iris_001_of_002.json", "iris_002_of_002.json"])
    );
    assert!(app.dir.path().join("chunks/iris_002_of_002.json").is_file());

    let (_, body) = call(&app, Method::POST, uri, None).await;
    assert_eq!(body["status"], json!("skipped"));
    assert_eq!(body["success"], json!(true));
}

#[tokio::test]
async fn stored_chunks_are_served_raw() {
    let app = app();
    call(&app, Method::POST, "/api/v1/io/data/chunk-dataset/iris", None).await;

    // 5 rows clamp the planned 20 chunks to 5
    let request = Request::builder()
        .uri("/api/v1/io/data/chunk/iris/5")
        .body(Body::empty())
        .unwrap();
    let (status, bytes, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        r#"[{"id":4,"name":"name4"}]"#
    );

    let (status, _) = call(&app, Method::GET, "/api/v1/io/data/chunk/iris/0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::GET,
        "/api/v1/io/data/chunk/iris/1?n_chunks=3",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn send_chunks_needs_a_url() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/io/data/send-chunks/iris",
        Some(json!({"url": " "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn upload_stores_a_dataset() {
    let app = app();
    let body = "--XBOUNDARY\r\n\
                Content-Disposition: form-data; name=\"file\"; filename=\"red wine.csv\"\r\n\
                Content-Type: text/csv\r\n\r\n\
                a,b\n1,2\n\r\n\
                --XBOUNDARY--\r\n";
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/io/upload")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from(body))
        .unwrap();

    let (status, bytes, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["dataset"], json!("red_wine"));

    let (status, body) = call(&app, Method::GET, "/api/v1/io/sample-data/red-wine/values", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([[1, 2]]));
}

#[tokio::test]
async fn account_lifecycle() {
    let app = app();
    let registration = json!({
        "username": "ada",
        "email": "ada@example.com",
        "password": "analytical-engine",
    });

    let (status, _) = call(&app, Method::POST, "/api/v1/auth/register", Some(registration.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(&app, Method::POST, "/api/v1/auth/register", Some(registration)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("User already exists"));

    let (status, _) = call(&app, Method::POST, "/api/v1/auth/login", Some(json!({"username": "ada"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        Some(json!({"username": "ada", "password": "wrong-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"username": "ada", "password": "analytical-engine"}).to_string(),
        ))
        .unwrap();
    let (status, bytes, cookie) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let token = serde_json::from_slice::<Value>(&bytes).unwrap()["token"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(cookie.unwrap().starts_with(&format!("session={token}")));

    let change = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/password/change")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(
            json!({
                "old_password": "analytical-engine",
                "new_password": "difference-engine",
                "confirm_password": "difference-engine",
            })
            .to_string(),
        ))
        .unwrap();
    let (status, _, _) = send(&app, change).await;
    assert_eq!(status, StatusCode::OK);

    let logout = |token: &str| {
        Request::builder()
            .method(Method::POST)
            .uri("/api/v1/auth/logout")
            .header(header::COOKIE, format!("session={token}"))
            .body(Body::empty())
            .unwrap()
    };
    let (status, _, _) = send(&app, logout(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, logout(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        Some(json!({"username": "ada", "password": "difference-engine"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn password_change_requires_a_session() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/auth/password/change",
        Some(json!({
            "old_password": "a",
            "new_password": "b",
            "confirm_password": "b",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
}
