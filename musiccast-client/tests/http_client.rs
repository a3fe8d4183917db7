//! Client tests against a local mock HTTP server

use std::time::Duration;

use musiccast_client::{ClientError, MusicCastClient};
use serde::Deserialize;
use url::Url;

fn client_for(server: &mockito::ServerGuard) -> MusicCastClient {
    let url = Url::parse(&format!("{}/", server.url())).unwrap();
    MusicCastClient::from_base_url(url, Duration::from_secs(2)).unwrap()
}

#[derive(Debug, Deserialize)]
struct Status {
    power: String,
    volume: i64,
}

#[tokio::test]
async fn test_get_json_success() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/YamahaExtendedControl/v1/main/getStatus")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"response_code":0,"power":"on","volume":42}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let status: Status = client.get_json("main/getStatus", &[]).await.unwrap();

    assert_eq!(status.power, "on");
    assert_eq!(status.volume, 42);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_query_parameters_are_encoded() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/YamahaExtendedControl/v1/main/setVolume")
        .match_query(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("volume".into(), "up".into()),
            mockito::Matcher::UrlEncoded("step".into(), "2".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"response_code":0}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    client
        .get("main/setVolume", &[("volume", "up".to_string()), ("step", "2".to_string())])
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_nonzero_response_code_is_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/YamahaExtendedControl/v1/main/setInput")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(r#"{"response_code":4}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .get("main/setInput", &[("input", "vinyl".to_string())])
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::ResponseCode(4)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_http_error_status() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/YamahaExtendedControl/v1/netusb/getPlayInfo")
        .with_status(503)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client.get("netusb/getPlayInfo", &[]).await.unwrap_err();

    assert!(matches!(err, ClientError::Http(503)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/YamahaExtendedControl/v1/system/getDeviceInfo")
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client.get("system/getDeviceInfo", &[]).await.unwrap_err();

    assert!(matches!(err, ClientError::Parse(_)));
}
