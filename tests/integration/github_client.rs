use futures::TryStreamExt;
use serde_json::json;
use std::time::Duration;
use zend::core::{ResolutionFailure, ZenError};
use zend::release::{GitHubClient, ReleaseSource};
use zend::test_utils::{TestHttpServer, init_test_logging};

const LATEST: &str = "/repos/owner/app/releases/latest";

fn client_for(server: &TestHttpServer) -> GitHubClient {
    GitHubClient::new(server.url(), Duration::from_secs(5), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_latest_release_sends_github_headers() {
    init_test_logging(None);
    let server = TestHttpServer::start().await.unwrap();
    server.json_route(
        LATEST,
        200,
        &json!({
            "tag_name": "v1.4.0",
            "name": "1.4.0",
            "assets": [
                {"name": "app-linux.tar.gz", "browser_download_url": "https://example.com/a", "size": 3},
                {"name": "app-darwin.zip", "browser_download_url": "https://example.com/b", "size": 4}
            ]
        }),
    );

    let release = client_for(&server).latest_release("owner/app", "secret-token").await.unwrap();

    assert_eq!(release.tag, "v1.4.0");
    assert_eq!(release.assets.len(), 2);
    assert_eq!(release.assets[0].name, "app-linux.tar.gz");
    assert_eq!(release.assets[1].download_url, "https://example.com/b");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, LATEST);
    assert_eq!(request.header("authorization"), Some("Bearer secret-token"));
    assert_eq!(request.header("accept"), Some("application/vnd.github+json"));
    assert_eq!(request.header("x-github-api-version"), Some("2022-11-28"));
    assert!(request.header("user-agent").unwrap().starts_with("zend/"));
}

#[tokio::test]
async fn test_latest_release_error_status() {
    let server = TestHttpServer::start().await.unwrap();
    server.json_route(LATEST, 401, &json!({"message": "Bad credentials"}));

    let result = client_for(&server).latest_release("owner/app", "bad").await;

    match result {
        Err(ZenError::ReleaseResolution { repo, failure }) => {
            assert_eq!(repo, "owner/app");
            assert_eq!(failure, ResolutionFailure::Status(401));
        }
        other => panic!("expected ReleaseResolution, got {other:?}"),
    }
}

#[tokio::test]
async fn test_latest_release_unknown_repo() {
    let server = TestHttpServer::start().await.unwrap();

    let result = client_for(&server).latest_release("owner/missing", "token").await;

    assert!(matches!(
        result,
        Err(ZenError::ReleaseResolution {
            failure: ResolutionFailure::Status(404),
            ..
        })
    ));
}

#[tokio::test]
async fn test_latest_release_malformed_body() {
    let server = TestHttpServer::start().await.unwrap();
    server.route(LATEST, 200, "<html>not json</html>");

    let result = client_for(&server).latest_release("owner/app", "token").await;

    assert!(matches!(
        result,
        Err(ZenError::ReleaseResolution {
            failure: ResolutionFailure::Decode(_),
            ..
        })
    ));
}

#[tokio::test]
async fn test_latest_release_connection_refused() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = GitHubClient::new(url, Duration::from_secs(5), Duration::from_secs(5)).unwrap();
    let result = client.latest_release("owner/app", "token").await;

    assert!(matches!(
        result,
        Err(ZenError::ReleaseResolution {
            failure: ResolutionFailure::Transport(_),
            ..
        })
    ));
}

#[tokio::test]
async fn test_download_asset_streams_body() {
    let server = TestHttpServer::start().await.unwrap();
    let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    server.route("/download/app.tar.gz", 200, payload.clone());

    let url = format!("{}/download/app.tar.gz", server.url());
    let stream = client_for(&server).download_asset(&url, "secret-token").await.unwrap();
    let chunks: Vec<bytes::Bytes> = stream.try_collect().await.unwrap();
    let body: Vec<u8> = chunks.concat();

    assert_eq!(body, payload);
    let request = &server.requests()[0];
    assert_eq!(request.header("authorization"), Some("Bearer secret-token"));
}

#[tokio::test]
async fn test_download_asset_error_status() {
    let server = TestHttpServer::start().await.unwrap();
    server.route("/download/app.zip", 500, "boom");

    let url = format!("{}/download/app.zip", server.url());
    let result = client_for(&server).download_asset(&url, "token").await;

    match result {
        Err(ZenError::Download { asset, status, .. }) => {
            assert_eq!(asset, url);
            assert_eq!(status, Some(500));
        }
        Err(other) => panic!("expected Download, got {other:?}"),
        Ok(_) => panic!("expected Download error"),
    }
}
