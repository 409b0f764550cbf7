use galley_client::release::{ReleaseChannel, ReleaseError, CHECK_TIMEOUT};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_available_releases_from_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest"))
        .and(header("user-agent", "Galley Node Agent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "Current version:     24.04\nAvailable LTS:       26.04 LTS\nAvailable non-LTS:   26.10\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let channel = ReleaseChannel::new(&server.uri(), CHECK_TIMEOUT).unwrap();
    let releases = channel.available().await.unwrap();

    assert_eq!(releases.lts.as_deref(), Some("26.04"));
    assert_eq!(releases.other.as_deref(), Some("26.10"));
}

#[tokio::test]
async fn test_missing_listing_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let channel = ReleaseChannel::new(&server.uri(), CHECK_TIMEOUT).unwrap();
    match channel.available().await.unwrap_err() {
        ReleaseError::UnexpectedStatus { code, url } => {
            assert_eq!(code, 404);
            assert!(url.ends_with("/latest"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_listing_gives_up_within_the_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let channel = ReleaseChannel::new(&server.uri(), Duration::from_millis(200)).unwrap();
    let err = channel.available().await.unwrap_err();
    assert!(matches!(err, ReleaseError::Unreachable { .. }), "{err:?}");
}

#[tokio::test]
async fn test_download_binary_for_target() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bin/26.04/galley-linux-arm64"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x7fELF-new".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let channel = ReleaseChannel::new(&server.uri(), CHECK_TIMEOUT).unwrap();
    let binary = channel.download("26.04", "linux-arm64").await.unwrap();
    assert_eq!(binary, b"\x7fELF-new");
}

#[tokio::test]
async fn test_empty_download_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bin/latest/galley-linux-amd64"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let channel = ReleaseChannel::new(&server.uri(), CHECK_TIMEOUT).unwrap();
    let err = channel.download("latest", "linux-amd64").await.unwrap_err();
    assert!(matches!(err, ReleaseError::EmptyBinary { .. }), "{err:?}");
}
