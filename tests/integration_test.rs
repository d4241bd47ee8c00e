use fts_top10::{page_id, NormalizedSnapshot};
use serde_json::json;
use std::fs::{self, File};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_full_pipeline_fetch_normalize_render() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let work_dir = temp_dir.path().join("work");
    let site_dir = temp_dir.path().join("site");
    fs::create_dir_all(&data_dir).unwrap();

    let document = json!({
        "year": 2025,
        "updated": "2025-08-02T06:00:00Z",
        "donors": {
            "USA": {
                "commitments": [
                    {"recipient": "Yemen", "amount": 250_000_000, "lat": 15.55, "lon": 48.52, "iso3": "YEM"},
                    {"recipient": "Sudan", "amount": 180_000_000}
                ],
                "disbursements": [
                    {"recipient": "Yemen", "amount": 420_000_000},
                    {"country": "Sudan", "amount": 90_000_000}
                ]
            },
            "EU": [
                {"recipient": "Ukraine", "amount": 310_000_000, "lat": 49.0, "lon": 32.0},
                {"recipient": "Syria", "amount": 120_000_000}
            ],
            "Sealand": null
        }
    });

    // Step 1: fetch from a mock origin.
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/top10_2025.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(document))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetch_args = fts_top10::fetch::FetchArgs {
        url: format!("{}/data/top10_2025.json", mock_server.uri()),
        output: data_dir.clone(),
        timeout: 5,
    };
    fts_top10::fetch::run_async(fetch_args).await.unwrap();

    assert!(data_dir.join("top10_2025.json").exists());

    // Step 2: normalize.
    let normalize_args = fts_top10::normalize::NormalizeArgs {
        input: data_dir.clone(),
        output: work_dir.clone(),
    };
    fts_top10::normalize::run(normalize_args).unwrap();

    let artifact: NormalizedSnapshot = serde_json::from_reader(
        File::open(work_dir.join("top10_2025.normalized.json")).unwrap(),
    )
    .unwrap();

    assert_eq!(artifact.year, Some(2025));

    // Preferred display order puts EU before USA; unknown donors follow in
    // document order.
    assert_eq!(artifact.donors.len(), 3);
    assert_eq!(artifact.donors[0].donor_key, "EU");
    assert_eq!(artifact.donors[1].donor_key, "USA");
    assert_eq!(artifact.donors[2].donor_key, "Sealand");

    let usa = &artifact.donors[1];
    assert!(usa.has_data);
    assert_eq!(usa.items[0].recipient, "Yemen");
    assert_eq!(usa.items[0].commitments, 250_000_000.0);
    assert_eq!(usa.items[0].disbursements, 420_000_000.0);
    assert_eq!(usa.items[0].iso3.as_deref(), Some("YEM"));

    // "country" and "recipient" name the same recipient; one entry, not two.
    assert_eq!(usa.items[1].recipient, "Sudan");
    assert_eq!(usa.items[1].commitments, 180_000_000.0);
    assert_eq!(usa.items[1].disbursements, 90_000_000.0);

    let eu = &artifact.donors[0];
    assert_eq!(eu.items[0].recipient, "Ukraine");
    assert_eq!(eu.items[0].commitments, 0.0);
    assert_eq!(eu.items[0].disbursements, 310_000_000.0);

    assert!(!artifact.donors[2].has_data);

    // Step 3: render.
    let render_args = fts_top10::render::RenderArgs {
        input: data_dir.clone(),
        output: site_dir.clone(),
        threads: 1,
    };
    fts_top10::render::run(render_args).unwrap();

    let html = fs::read_to_string(site_dir.join("top10_2025.html")).unwrap();
    for donor in ["USA", "EU", "Sealand"] {
        assert!(html.contains(&page_id(donor)));
    }
    assert!(html.contains("Yemen"));
    assert!(html.contains("250,000,000 USD"));
    assert!(html.contains("420,000,000 USD"));
    assert!(html.contains(fts_top10::render::NO_DATA_MESSAGE));
    assert!(html.contains(r#""toggle":true"#));
}
