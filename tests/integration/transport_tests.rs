//! ThrottledUrlReader behavior against a mock server: method selection,
//! retries on transient failures, and rate limiting.

mod common;

use std::time::{Duration, Instant};

use common::mock_config;
use eutils_session::{ClientConfig, EutilsError, RetryConfig, ThrottledUrlReader, UrlReader};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing_test::traced_test;
use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reader_for(mock_server: &MockServer) -> ThrottledUrlReader {
    ThrottledUrlReader::with_config(&mock_config(mock_server)).expect("reader should build")
}

#[tokio::test]
#[traced_test]
async fn test_get_without_params() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/einfo.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<eInfoResult/>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let reader = reader_for(&mock_server);
    let body = reader
        .read_url(&format!("{}/einfo.fcgi", mock_server.uri()), None, true)
        .await
        .unwrap();

    assert_eq!(body, "<eInfoResult/>");
}

#[tokio::test]
#[traced_test]
async fn test_get_appends_params_to_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("api_key", "k"))
        .and(query_param("db", "pmc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let reader = reader_for(&mock_server);
    let url = format!("{}/esearch.fcgi?&api_key=k", mock_server.uri());
    let body = reader.read_url(&url, Some("db=pmc"), true).await.unwrap();

    assert_eq!(body, "ok");
}

#[tokio::test]
#[traced_test]
async fn test_params_without_get_become_post_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/epost.fcgi"))
        .and(body_string("db=pubmed&id=1,2,3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("posted"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let reader = reader_for(&mock_server);
    let url = format!("{}/epost.fcgi", mock_server.uri());
    let body = reader
        .read_url(&url, Some("db=pubmed&id=1,2,3"), false)
        .await
        .unwrap();

    assert_eq!(body, "posted");
}

#[tokio::test]
#[traced_test]
async fn test_no_params_is_get_even_when_post_requested() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("summary"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let reader = reader_for(&mock_server);
    let url = format!("{}/esummary.fcgi", mock_server.uri());
    assert_eq!(reader.read_url(&url, None, false).await.unwrap(), "summary");
}

#[tokio::test]
#[traced_test]
async fn test_retries_server_errors_then_succeeds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<PubmedArticleSet/>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let reader = reader_for(&mock_server);
    let url = format!("{}/efetch.fcgi", mock_server.uri());
    let body = reader.read_url(&url, None, true).await.unwrap();

    assert_eq!(body, "<PubmedArticleSet/>");
}

#[tokio::test]
#[traced_test]
async fn test_retries_rate_limited_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/epost.fcgi"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/epost.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("posted"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let reader = reader_for(&mock_server);
    let url = format!("{}/epost.fcgi", mock_server.uri());
    let body = reader.read_url(&url, Some("db=pubmed&id=1"), false).await.unwrap();

    assert_eq!(body, "posted");
}

#[tokio::test]
#[traced_test]
async fn test_gives_up_after_configured_retries() {
    let mock_server = MockServer::start().await;

    // One attempt plus the two retries from mock_config
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&mock_server)
        .await;

    let reader = reader_for(&mock_server);
    let err = reader
        .read_url(&format!("{}/esearch.fcgi", mock_server.uri()), None, true)
        .await
        .unwrap_err();

    assert!(matches!(err, EutilsError::Api { status: 502, .. }));
}

#[tokio::test]
#[traced_test]
async fn test_client_errors_are_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let reader = reader_for(&mock_server);
    let err = reader
        .read_url(&format!("{}/missing.fcgi", mock_server.uri()), None, true)
        .await
        .unwrap_err();

    match err {
        EutilsError::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Not Found");
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
#[traced_test]
async fn test_connection_failure_is_transport_error() {
    let config = ClientConfig::new()
        .with_rate_limit(100.0)
        .with_retry_config(RetryConfig::no_retry());
    let reader = ThrottledUrlReader::with_config(&config).unwrap();

    // Port 9 (discard) on localhost is closed in test environments
    let err = reader
        .read_url("http://127.0.0.1:9/esearch.fcgi", None, true)
        .await
        .unwrap_err();

    assert!(matches!(err, EutilsError::Transport(_)));
}

#[tokio::test]
#[traced_test]
async fn test_requests_are_throttled() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(4)
        .mount(&mock_server)
        .await;

    let config = mock_config(&mock_server).with_rate_limit(2.0);
    let reader = ThrottledUrlReader::with_config(&config).unwrap();
    let url = format!("{}/einfo.fcgi", mock_server.uri());

    let start = Instant::now();
    for _ in 0..4 {
        reader.read_url(&url, None, true).await.unwrap();
    }

    // Two requests go out from the full bucket, the other two wait ~500ms each
    assert!(start.elapsed() >= Duration::from_millis(900));
}

#[tokio::test]
#[traced_test]
async fn test_stalled_body_is_retried() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // First connection sends headers and half the body, then goes quiet
    tokio::spawn(async move {
        let mut request = [0u8; 4096];

        let (mut stalled, _) = listener.accept().await.unwrap();
        let _ = stalled.read(&mut request).await;
        stalled
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 10\r\n\r\n<eSe")
            .await
            .unwrap();

        let (mut healthy, _) = listener.accept().await.unwrap();
        let _ = healthy.read(&mut request).await;
        healthy
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 10\r\nconnection: close\r\n\r\n<eSearch/>")
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stalled);
    });

    let config = ClientConfig::new()
        .with_rate_limit(100.0)
        .with_timeout(Duration::from_millis(300))
        .with_retry_config(
            RetryConfig::new()
                .with_max_retries(1)
                .with_initial_delay(Duration::from_millis(10))
                .without_jitter(),
        );
    let reader = ThrottledUrlReader::with_config(&config).unwrap();

    let body = reader
        .read_url(&format!("http://{}/esearch.fcgi", addr), None, true)
        .await
        .unwrap();

    assert_eq!(body, "<eSearch/>");
}
