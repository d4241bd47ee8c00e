use serde_json::json;
use std::fs::File;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_document_success_sends_cache_bust() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/top10_2025.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "year": 2025,
            "donors": {"EU": []}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fts_top10::fetch::SnapshotClient::new(5);
    let url = format!("{}/data/top10_2025.json", mock_server.uri());
    let doc = client.fetch_document(&url).await.unwrap();

    assert_eq!(doc["year"], 2025);

    // Every request carries the exporter's cache-bust parameter.
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.query().unwrap_or_default().contains("cb="));
}

#[tokio::test]
async fn test_fetch_appends_cache_bust_after_existing_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/snap.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"donors": {}})))
        .mount(&mock_server)
        .await;

    let client = fts_top10::fetch::SnapshotClient::new(5);
    let url = format!("{}/snap.json?v=2", mock_server.uri());
    client.fetch_document(&url).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap().to_string();
    assert!(query.starts_with("v=2&cb="));
}

#[tokio::test]
async fn test_fetch_retries_on_500_then_succeeds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/snap.json"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/snap.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"donors": {}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fts_top10::fetch::SnapshotClient::new(5);
    let url = format!("{}/snap.json", mock_server.uri());
    let doc = client.fetch_document(&url).await.unwrap();

    assert!(doc["donors"].is_object());
}

#[tokio::test]
async fn test_fetch_waits_out_rate_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/snap.json"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/snap.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"donors": {}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fts_top10::fetch::SnapshotClient::new(5);
    let url = format!("{}/snap.json", mock_server.uri());
    let doc = client.fetch_document(&url).await.unwrap();

    assert!(doc["donors"].is_object());
}

#[tokio::test]
async fn test_fetch_fails_fast_on_404() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fts_top10::fetch::SnapshotClient::new(5);
    let url = format!("{}/missing.json", mock_server.uri());
    let err = client.fetch_document(&url).await.unwrap_err();

    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn test_fetch_rejects_malformed_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/snap.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("this is not json"))
        .mount(&mock_server)
        .await;

    let client = fts_top10::fetch::SnapshotClient::new(5);
    let url = format!("{}/snap.json", mock_server.uri());
    let err = client.fetch_document(&url).await.unwrap_err();

    assert!(err.to_string().contains("JSON"));
}

#[tokio::test]
async fn test_fetch_stage_writes_year_named_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/top10.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "year": 2025,
            "updated": "2025-08-01T00:00:00Z",
            "donors": {"EU": [{"recipient": "Sudan", "amount": 5}]}
        })))
        .mount(&mock_server)
        .await;

    let args = fts_top10::fetch::FetchArgs {
        url: format!("{}/data/top10.json", mock_server.uri()),
        output: temp_dir.path().to_path_buf(),
        timeout: 5,
    };
    fts_top10::fetch::run_async(args).await.unwrap();

    let out_path = temp_dir.path().join("top10_2025.json");
    assert!(out_path.exists());

    let doc: serde_json::Value = serde_json::from_reader(File::open(&out_path).unwrap()).unwrap();
    assert_eq!(doc["donors"]["EU"][0]["recipient"], "Sudan");
}

#[tokio::test]
async fn test_fetch_stage_defaults_name_without_year() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/snap.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"donors": {}})))
        .mount(&mock_server)
        .await;

    let args = fts_top10::fetch::FetchArgs {
        url: format!("{}/snap.json", mock_server.uri()),
        output: temp_dir.path().to_path_buf(),
        timeout: 5,
    };
    fts_top10::fetch::run_async(args).await.unwrap();

    assert!(temp_dir.path().join("top10.json").exists());
}
