use chrono::{TimeZone, Utc};
use mockito::{Matcher, Server};
use serde_json::json;
use spotify_history_sync as lib;
use lib::api::spotify::SpotifyClient;
use lib::api::HistoryProvider;
use lib::config::Config;
use lib::models::AccessToken;
use lib::pipeline::{run_with_provider, window_start_ms, RunOutcome};

fn config_for(base: &str, db_path: std::path::PathBuf) -> Config {
    let mut cfg = Config::default();
    cfg.auth_base = base.to_string();
    cfg.api_base = base.to_string();
    cfg.client_id = "test_id".into();
    cfg.client_secret = "test_secret".into();
    cfg.refresh_token = "refresh-spotify".into();
    cfg.db_path = db_path;
    cfg
}

#[test]
fn fetch_sends_after_limit_and_bearer() {
    let mut server = Server::new();
    let base = server.url();

    let m = server
        .mock("GET", "/me/player/recently-played")
        .match_header("authorization", "Bearer access-1")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("after".into(), "1714942800000".into()),
            Matcher::UrlEncoded("limit".into(), "50".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"items": [], "next": null}).to_string())
        .expect(1)
        .create();

    let td = tempfile::tempdir().unwrap();
    let client = SpotifyClient::from_config(&config_for(&base, td.path().join("t.db"))).unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let page = rt
        .block_on(client.recently_played(&AccessToken::new("access-1"), 1714942800000, 50))
        .expect("fetch");
    assert!(page.items.is_empty());
    m.assert();
}

#[test]
fn fetch_non_success_is_error() {
    let mut server = Server::new();
    let base = server.url();

    let _m = server
        .mock("GET", "/me/player/recently-played")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"error":{"status":401,"message":"The access token expired"}}"#)
        .create();

    let td = tempfile::tempdir().unwrap();
    let client = SpotifyClient::from_config(&config_for(&base, td.path().join("t.db"))).unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let e = rt
        .block_on(client.recently_played(&AccessToken::new("stale"), 0, 50))
        .unwrap_err()
        .to_string();
    assert!(e.contains("401"));
}

#[test]
fn end_to_end_run_against_mock_api_loads_rows() {
    let mut server = Server::new();
    let base = server.url();
    let now = Utc.with_ymd_and_hms(2024, 5, 5, 21, 0, 0).unwrap();
    let after = window_start_ms(now, 24).unwrap().to_string();

    let _token = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"fresh"}"#)
        .create();
    let history = server
        .mock("GET", "/me/player/recently-played")
        .match_header("authorization", "Bearer fresh")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("after".into(), after),
            Matcher::UrlEncoded("limit".into(), "50".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "items": [
                    {"track": {"name": "Song A", "album": {"artists": [{"name": "Artist A"}, {"name": "Guest"}]}}, "played_at": "2024-05-05T20:01:02.345Z"},
                    {"track": {"name": "Song B", "album": {"artists": [{"name": "Artist B"}]}}, "played_at": "2024-05-04T23:59:59.000Z"}
                ],
                "next": null
            })
            .to_string(),
        )
        .expect(1)
        .create();

    let td = tempfile::tempdir().unwrap();
    let db_path = td.path().join("spotify_tracks.sqlite");
    let cfg = config_for(&base, db_path.clone());
    let client = SpotifyClient::from_config(&cfg).unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let outcome = rt.block_on(run_with_provider(&cfg, &client, now)).expect("run");
    history.assert();

    match outcome {
        RunOutcome::Loaded { fetched, stats } => {
            assert_eq!(fetched, 2);
            assert_eq!(stats.inserted, 2);
        }
        RunOutcome::Skipped => panic!("expected rows to load"),
    }

    let conn = rusqlite::Connection::open(&db_path).unwrap();
    let (artist, date): (String, String) = conn
        .query_row(
            "SELECT artist_name, timestamp FROM spotify_tracks WHERE played_at = '2024-05-05T20:01:02.345Z'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(artist, "Artist A");
    assert_eq!(date, "2024-05-05");
}

#[test]
fn token_failure_aborts_before_fetch() {
    let mut server = Server::new();
    let base = server.url();

    let _token = server
        .mock("POST", "/api/token")
        .with_status(500)
        .with_body(r#"{"error":"server"}"#)
        .create();
    let history = server
        .mock("GET", "/me/player/recently-played")
        .match_query(Matcher::Any)
        .expect(0)
        .create();

    let td = tempfile::tempdir().unwrap();
    let db_path = td.path().join("spotify_tracks.sqlite");
    let cfg = config_for(&base, db_path.clone());
    let client = SpotifyClient::from_config(&cfg).unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let res = rt.block_on(run_with_provider(&cfg, &client, Utc::now()));

    assert!(res.is_err());
    history.assert();
    assert!(!db_path.exists());
}
