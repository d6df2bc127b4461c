//! Integration tests for downloading and decrypting connector profiles
//!
//! A local one-shot HTTP server stands in for the CloudConnexa backend.

mod common;

use common::{refused_base_url, TestServer, FILE_REF};
use libconnector::crypto::seal;
use libconnector::{ConnectorConfig, ConnectorError, DecryptError, DecryptParams, ProfileFetch, SetupToken};

const PROFILE: &str = "client\ndev tun\nproto udp\nremote connector.example.net 1194\n";

fn test_config(base_url: String) -> ConnectorConfig {
    ConnectorConfig {
        base_url,
        system_proxy: false,
        decrypt: DecryptParams {
            iterations: 1000,
            ..DecryptParams::default()
        },
        ..ConnectorConfig::default()
    }
}

fn token(password: &str) -> SetupToken {
    let wire = SetupToken::builder().password(password).file_ref(FILE_REF).encode();
    SetupToken::decode(&wire, 40).unwrap()
}

fn payload(password: &str, config: &ConnectorConfig) -> String {
    seal(password.as_bytes(), &[0x5a; 32], PROFILE.as_bytes(), &config.decrypt).unwrap()
}

#[tokio::test]
async fn test_download_and_decrypt() {
    let probe = test_config(String::new());
    let server = TestServer::start("200 OK", &format!("{}\n", payload("correct-password", &probe)));
    let config = test_config(server.base_url());

    let mut fetch = ProfileFetch::new(token("correct-password"), &config).unwrap();
    fetch.download().await.unwrap();

    assert!(fetch.is_fetched());
    assert_eq!(fetch.profile().unwrap(), PROFILE);

    let request = server.request();
    assert!(request.starts_with(&format!("GET /cvpn/api/v1/profiles/{} HTTP/1.1", FILE_REF)));
    assert!(request.to_ascii_lowercase().contains("user-agent: openvpn-connector-setup"));
}

#[tokio::test]
async fn test_save_writes_profile() {
    let probe = test_config(String::new());
    let server = TestServer::start("200 OK", &payload("pw", &probe));
    let config = test_config(server.base_url());

    let mut fetch = ProfileFetch::new(token("pw"), &config).unwrap();
    fetch.download().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("connector.conf");
    fetch.save(&dest).await.unwrap();
    // repeatable
    fetch.save(&dest).await.unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), PROFILE.as_bytes());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[tokio::test]
async fn test_wrong_password_is_auth_failure() {
    let probe = test_config(String::new());
    let server = TestServer::start("200 OK", &payload("correct-password", &probe));
    let config = test_config(server.base_url());

    let mut fetch = ProfileFetch::new(token("wrong-password"), &config).unwrap();
    match fetch.download().await {
        Err(ConnectorError::Decrypt(e)) => assert!(e.is_auth_failure()),
        other => panic!("expected Decrypt error, got {:?}", other),
    }
    assert!(!fetch.is_fetched());
}

#[tokio::test]
async fn test_short_payload_is_decrypt_error() {
    // 10 decoded bytes, less than salt + tag
    let server = TestServer::start("200 OK", "AAAAAAAAAAAAAA==");
    let config = test_config(server.base_url());

    let mut fetch = ProfileFetch::new(token("pw"), &config).unwrap();
    match fetch.download().await {
        Err(ConnectorError::Decrypt(DecryptError::Truncated { length, minimum })) => {
            assert_eq!(length, 10);
            assert_eq!(minimum, 48);
        }
        other => panic!("expected truncated payload error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_garbage_body_is_decrypt_error() {
    let server = TestServer::start("200 OK", "<html>maintenance</html>");
    let config = test_config(server.base_url());

    let mut fetch = ProfileFetch::new(token("pw"), &config).unwrap();
    let err = fetch.download().await.unwrap_err();
    assert!(matches!(err, ConnectorError::Decrypt(DecryptError::Decode(_))));
    assert_eq!(err.exit_code(), 4);
}

#[tokio::test]
async fn test_http_error_status_is_download_error() {
    let server = TestServer::start("404 Not Found", "no such profile");
    let config = test_config(server.base_url());

    let mut fetch = ProfileFetch::new(token("pw"), &config).unwrap();
    let expected_url = fetch.download_url();
    match fetch.download().await {
        Err(ConnectorError::Download { url, message }) => {
            assert_eq!(url, expected_url);
            assert!(message.contains("404"), "message: {}", message);
        }
        other => panic!("expected Download error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_carries_url() {
    let config = test_config(refused_base_url());

    let mut fetch = ProfileFetch::new(token("pw"), &config).unwrap();
    let expected_url = format!("{}{}", config.base_url, FILE_REF);
    assert_eq!(fetch.download_url(), expected_url);

    let err = fetch.download().await.unwrap_err();
    assert_eq!(err.url(), Some(expected_url.as_str()));
    assert_eq!(err.exit_code(), 5);
}

#[tokio::test]
async fn test_invalid_key_never_reaches_network() {
    let config = test_config(refused_base_url());
    let bad = SetupToken::builder().key_segment("***").file_ref(FILE_REF).build();

    let mut fetch = ProfileFetch::new(bad, &config).unwrap();
    assert!(matches!(
        fetch.download().await,
        Err(ConnectorError::InvalidKeyEncoding(_))
    ));
}

#[tokio::test]
async fn test_retry_after_failure() {
    let probe = test_config(String::new());
    let server = TestServer::start("200 OK", &payload("pw", &probe));

    let mut fetch = ProfileFetch::new(token("pw"), &test_config(refused_base_url())).unwrap();
    assert!(fetch.download().await.is_err());

    // A new fetcher against a working backend succeeds
    let mut fetch = ProfileFetch::new(fetch.token().clone(), &test_config(server.base_url())).unwrap();
    fetch.download().await.unwrap();
    assert_eq!(fetch.profile().unwrap(), PROFILE);
}
