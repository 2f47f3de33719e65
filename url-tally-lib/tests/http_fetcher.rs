// url-tally-lib/tests/http_fetcher.rs

//! The reqwest-backed fetcher against a local mock server.

use url::Url;
use url_tally_lib::{Dispatcher, Fetcher, HttpFetcher, TallyConfig, TallyError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetches_full_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gophers"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Go Go Gophers"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new("url-tally-test").unwrap();
    let url = Url::parse(&format!("{}/gophers", server.uri())).unwrap();
    let body = fetcher.fetch(&url).await.unwrap();

    assert_eq!(body, b"Go Go Gophers");
}

#[tokio::test]
async fn test_sends_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "tally-bot/9"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new("tally-bot/9").unwrap();
    let url = Url::parse(&server.uri()).unwrap();
    assert!(fetcher.fetch(&url).await.is_ok());
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Go away"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new("url-tally-test").unwrap();
    let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
    let err = fetcher.fetch(&url).await.unwrap_err();

    match err {
        TallyError::HttpStatus { status, .. } => assert_eq!(status, 404),
        other => panic!("expected HTTP status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_is_a_network_error() {
    // Bind then drop a listener so the port is known to be closed.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let uri = format!("http://127.0.0.1:{}/", port);

    let fetcher = HttpFetcher::new("url-tally-test").unwrap();
    let err = fetcher.fetch(&Url::parse(&uri).unwrap()).await.unwrap_err();
    assert!(matches!(err, TallyError::NetworkError { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dispatch_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Go, Go"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Go"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let input = format!(
        "{uri}/a\n{uri}/broken\n{uri}/b\n{uri}/a\nexit\n",
        uri = server.uri()
    );

    let fetcher = HttpFetcher::new("url-tally-test").unwrap();
    let dispatcher = Dispatcher::new(TallyConfig::default(), fetcher, std::io::sink());
    let summary = dispatcher.run(input.as_bytes()).await;

    assert_eq!(summary.total, 5);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.dispatched, 4);
}
