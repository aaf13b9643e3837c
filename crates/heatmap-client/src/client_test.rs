use super::*;

fn test_client(base_url: &str) -> HeatmapClient {
    HeatmapClient::new(base_url, 30).expect("client construction should not fail")
}

#[test]
fn build_url_appends_segments() {
    let client = test_client("http://localhost:3000");
    let url = client.build_url(&["api", "v1", "stores"], &[]);
    assert_eq!(url.as_str(), "http://localhost:3000/api/v1/stores");
}

#[test]
fn build_url_keeps_base_path_and_strips_trailing_slash() {
    let client = test_client("http://localhost:3000/heatmaps/");
    let url = client.build_url(&["api", "v1", "stores"], &[("camera_id", "abc")]);
    assert_eq!(
        url.as_str(),
        "http://localhost:3000/heatmaps/api/v1/stores?camera_id=abc"
    );
}

#[test]
fn build_url_encodes_segments() {
    let client = test_client("http://localhost:3000");
    let url = client.build_url(&["api", "a b"], &[]);
    assert_eq!(url.as_str(), "http://localhost:3000/api/a%20b");
}

#[test]
fn invalid_base_url_is_rejected() {
    let err = HeatmapClient::new("not a url", 30)
        .err()
        .expect("should reject");
    assert!(matches!(err, ClientError::InvalidBaseUrl { .. }));
}
