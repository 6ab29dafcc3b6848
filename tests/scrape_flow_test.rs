//! End-to-end batch tests: feed, CSV sink and downloads together.

use instagram_media_scraper::config::{Config, Credentials};
use instagram_media_scraper::scraper::run_batch;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn batch_config(base_url: &str, workspace: &TempDir) -> Config {
    Config {
        base_url: base_url.to_string(),
        destination_root: workspace.path().join("photos"),
        output_path: workspace.path().join("results.csv"),
        ..Config::for_testing()
    }
}

/// A feed item whose media URL points back at the mock server, behind a
/// dimension segment and a cache-buster the extractor must strip.
fn item_json(base_url: &str, id: &str, caption: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "type": "image",
        "created_time": "1500000000",
        "likes": {"count": 3},
        "caption": {"text": caption},
        "comments": {"count": 0, "data": []},
        "images": {"standard_resolution": {
            "url": format!("{base_url}/s640x640/{id}.jpg?ig_cache=1")
        }},
    })
}

async fn mount_media_file(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{id}.jpg")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("jpeg-{id}").into_bytes()))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("Set-Cookie", "csrftoken=abc; Path=/"),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/accounts/login/ajax/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "csrftoken=rotated; Path=/")
                .set_body_json(serde_json::json!({"authenticated": true})),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_batch_continues_past_unavailable_account() {
    let server = MockServer::start().await;
    let workspace = TempDir::new().unwrap();
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/gooduser/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                item_json(&base, "aaa", "pier at dusk #sunset"),
                item_json(&base, "bbb", "#sunset again #nofilter"),
            ],
            "more_available": false,
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_media_file(&server, "aaa").await;
    mount_media_file(&server, "bbb").await;

    Mock::given(method("GET"))
        .and(path("/gone/media"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = batch_config(&base, &workspace);
    let accounts = vec!["gooduser".to_string(), "gone".to_string()];
    let summary = run_batch(&config, &accounts).await.unwrap();

    assert_eq!(summary.accounts_scraped, 1);
    assert_eq!(summary.accounts_unavailable, 1);
    assert_eq!(summary.rows_written, 2);
    assert_eq!(summary.downloads_completed, 2);
    assert_eq!(summary.downloads_failed, 0);

    // Only the first account's rows made it into the CSV.
    let csv = std::fs::read_to_string(workspace.path().join("results.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Account,Likes,Posted,URL,Img,Hashtags");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("gooduser,3,"));
    assert!(lines[1].contains("aaa.jpg"));
    assert!(lines[1].contains("#sunset"));
    assert!(lines[2].contains("\"#sunset, #nofilter\""));
    assert!(!csv.contains("gone"));

    // Media landed under the per-account folder, with canonical names.
    let good_dir = workspace.path().join("photos").join("gooduser");
    assert_eq!(
        std::fs::read(good_dir.join("aaa.jpg")).unwrap(),
        b"jpeg-aaa"
    );
    assert_eq!(
        std::fs::read(good_dir.join("bbb.jpg")).unwrap(),
        b"jpeg-bbb"
    );
}

#[tokio::test]
async fn test_private_account_logs_out_once_and_run_succeeds() {
    let server = MockServer::start().await;
    let workspace = TempDir::new().unwrap();
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/privateuser/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [],
            "more_available": false,
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Logged out on detection; the end-of-batch logout is then a no-op.
    Mock::given(method("POST"))
        .and(path("/accounts/logout/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        credentials: Some(Credentials {
            username: "me".to_string(),
            password: "hunter2".to_string(),
        }),
        ..batch_config(&server.uri(), &workspace)
    };

    let accounts = vec!["privateuser".to_string()];
    let summary = run_batch(&config, &accounts).await.unwrap();

    assert_eq!(summary.accounts_scraped, 0);
    assert_eq!(summary.accounts_unavailable, 1);
    assert_eq!(summary.rows_written, 0);

    // The results file still exists with just the header.
    let csv = std::fs::read_to_string(workspace.path().join("results.csv")).unwrap();
    assert_eq!(csv.trim_end(), "Account,Likes,Posted,URL,Img,Hashtags");
}

#[tokio::test]
async fn test_rejected_login_aborts_before_any_scraping() {
    let server = MockServer::start().await;
    let workspace = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("Set-Cookie", "csrftoken=abc; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/accounts/login/ajax/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"authenticated": false})),
        )
        .mount(&server)
        .await;

    // No media request may be issued after a rejected login.
    Mock::given(method("GET"))
        .and(path("/someuser/media"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = Config {
        credentials: Some(Credentials {
            username: "me".to_string(),
            password: "wrong".to_string(),
        }),
        ..batch_config(&server.uri(), &workspace)
    };

    let accounts = vec!["someuser".to_string()];
    let result = run_batch(&config, &accounts).await;

    assert!(result.is_err());
    assert!(
        !workspace.path().join("results.csv").exists(),
        "no partial output before authentication succeeds"
    );
}

#[tokio::test]
async fn test_existing_files_are_skipped_on_rerun() {
    let server = MockServer::start().await;
    let workspace = TempDir::new().unwrap();
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/gooduser/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [item_json(&base, "ccc", "#repeat")],
            "more_available": false,
        })))
        .expect(1)
        .mount(&server)
        .await;

    // The media file is already on disk; the rerun must not fetch it.
    Mock::given(method("GET"))
        .and(path("/ccc.jpg"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let good_dir = workspace.path().join("photos").join("gooduser");
    std::fs::create_dir_all(&good_dir).unwrap();
    std::fs::write(good_dir.join("ccc.jpg"), b"bytes from last run").unwrap();

    let config = batch_config(&base, &workspace);
    let accounts = vec!["gooduser".to_string()];
    let summary = run_batch(&config, &accounts).await.unwrap();

    assert_eq!(summary.downloads_completed, 0);
    assert_eq!(summary.downloads_skipped, 1);
    assert_eq!(
        std::fs::read(good_dir.join("ccc.jpg")).unwrap(),
        b"bytes from last run"
    );
}
