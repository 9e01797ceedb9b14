//! End-to-end request flow through the router

use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bucket_proxy::config::BucketName;
use bucket_proxy::proxy::error_response::ErrorResponse;
use bucket_proxy::proxy::types::{ObjectKey, ProxyConfig, StreamBufferSize};
use bucket_proxy::proxy::ProxyService;
use bucket_proxy::store::{MemoryObjectStore, S3ObjectStore, StoredObject};
use http_body_util::BodyExt;
use mockito::{Matcher, Server, ServerGuard};
use std::sync::Arc;
use tower::ServiceExt;

fn s3_router(server: &ServerGuard) -> Router {
    let config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .endpoint_url(server.url())
        .force_path_style(true)
        .credentials_provider(Credentials::new("test", "test", None, None, "test"))
        .retry_config(RetryConfig::disabled())
        .build();
    let store = S3ObjectStore::new(
        aws_sdk_s3::Client::from_conf(config),
        BucketName::try_new("site").unwrap(),
        StreamBufferSize::default(),
    );
    ProxyService::new(ProxyConfig::default(), Arc::new(store)).into_router()
}

fn get(path: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(path)
}

async fn body_of(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

#[tokio::test]
async fn test_s3_object_is_relayed_with_metadata() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(r"^/site/css/app\.css(\?.*)?$".to_string()))
        .with_status(200)
        .with_header("content-type", "text/css")
        .with_header("etag", "\"abc123\"")
        .with_header("last-modified", "Wed, 21 Oct 2015 07:28:00 GMT")
        .with_header("cache-control", "public, max-age=300")
        .with_body("body{margin:0}")
        .create_async()
        .await;

    let response = s3_router(&server)
        .oneshot(get("/css/app.css").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["content-type"], "text/css");
    assert_eq!(headers["content-length"], "14");
    assert_eq!(headers["etag"], "\"abc123\"");
    assert_eq!(headers["last-modified"], "Wed, 21 Oct 2015 07:28:00 GMT");
    assert_eq!(headers["cache-control"], "public, max-age=300");
    assert_eq!(headers["accept-ranges"], "bytes");
    assert_eq!(body_of(response).await, b"body{margin:0}");
}

#[tokio::test]
async fn test_s3_partial_content() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(r"^/site/video\.mp4(\?.*)?$".to_string()))
        .match_header("range", "bytes=-4")
        .with_status(206)
        .with_header("content-range", "bytes 96-99/100")
        .with_body("tail")
        .create_async()
        .await;

    let response = s3_router(&server)
        .oneshot(
            get("/video.mp4")
                .header("range", "bytes=-4")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()["content-range"], "bytes 96-99/100");
    assert_eq!(response.headers()["content-length"], "4");
    assert_eq!(body_of(response).await, b"tail");
}

#[tokio::test]
async fn test_s3_not_modified() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(r"^/site/index\.html(\?.*)?$".to_string()))
        .match_header("if-none-match", "\"v7\"")
        .with_status(304)
        .with_header("etag", "\"v7\"")
        .create_async()
        .await;

    let response = s3_router(&server)
        .oneshot(
            get("/index.html")
                .header("if-none-match", "\"v7\"")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(response.headers()["etag"], "\"v7\"");
    assert!(body_of(response).await.is_empty());
}

#[tokio::test]
async fn test_s3_errors_map_to_statuses() {
    let mut server = Server::new_async().await;
    for (status, code, name) in [
        (404, "NoSuchKey", "missing"),
        (403, "AccessDenied", "private"),
        (416, "InvalidRange", "short"),
        (503, "SlowDown", "busy"),
    ] {
        server
            .mock("GET", Matcher::Regex(format!(r"^/site/{name}(\?.*)?$")))
            .with_status(status)
            .with_header("content-type", "application/xml")
            .with_body(format!("<Error><Code>{code}</Code><Message>{code}</Message></Error>"))
            .create_async()
            .await;
    }
    let router = s3_router(&server);

    for (path, expected) in [
        ("/missing", StatusCode::NOT_FOUND),
        ("/private", StatusCode::FORBIDDEN),
        ("/short", StatusCode::RANGE_NOT_SATISFIABLE),
        ("/busy", StatusCode::BAD_GATEWAY),
    ] {
        let response = router
            .clone()
            .oneshot(get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "{path}");

        let error: ErrorResponse = serde_json::from_slice(&body_of(response).await).unwrap();
        assert!(error.request_id.is_some());
    }
}

#[tokio::test]
async fn test_client_request_id_is_echoed() {
    let store = MemoryObjectStore::builder()
        .object(ObjectKey::try_new("a.txt").unwrap(), StoredObject::new("a"))
        .build();
    let router = ProxyService::new(ProxyConfig::default(), Arc::new(store)).into_router();
    let request_id = "0190f1a8-7b5e-7c3d-9a2b-1234567890ab";

    for path in ["/a.txt", "/b.txt"] {
        let response = router
            .clone()
            .oneshot(
                get(path)
                    .header("x-request-id", request_id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], request_id);
    }
}

#[tokio::test]
async fn test_post_never_reaches_store() {
    let server = Server::new_async().await;
    let response = s3_router(&server)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/anything")
                .body(Body::from("payload"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_of(response).await, b"405 - Method Not Allowed");
}
