//! Fetch-and-extract worker and pool against a local HTTP server

mod common;

use common::{MockServer, Reply, files_in, zip_bytes};
use nemfetch::observability::Metrics;
use nemfetch::worker::runner::fetch_and_extract;
use nemfetch::worker::{
    Backoff, DownloadError, FetchError, HttpConfig, HttpSession, WorkerConfig, WorkerPool,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const REGION_ZIP: &str = "/files/PUBLIC_DVD_P5MIN_REGIONSOLUTION_ALL_202401010000.zip";

fn session() -> HttpSession {
    let config = HttpConfig {
        request_timeout: Duration::from_secs(10),
        ..HttpConfig::default()
    };
    HttpSession::new(&config).unwrap()
}

fn fast_backoff(max_attempts: u32) -> Backoff {
    Backoff::new(max_attempts, 2.0, Duration::from_millis(1))
}

fn region_archive() -> Vec<u8> {
    zip_bytes(&[
        ("PUBLIC_DVD_P5MIN_REGIONSOLUTION_ALL_202401010000.CSV", "I,P5MIN,REGIONSOLUTION\nD,1,NSW1\n"),
        ("README.txt", "archive member"),
    ])
}

#[tokio::test]
async fn test_archive_is_extracted_and_removed() {
    let server = MockServer::start(vec![(REGION_ZIP.to_string(), vec![Reply::ok(region_archive())])]).await;
    let dir = TempDir::new().unwrap();
    let metrics = Metrics::new();

    let outcome = fetch_and_extract(
        &session(),
        &server.link(REGION_ZIP),
        dir.path(),
        &fast_backoff(5),
        &metrics,
    )
    .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.link, server.link(REGION_ZIP));
    assert_eq!(outcome.attempts, 1);
    assert_eq!(
        files_in(dir.path()),
        vec!["PUBLIC_DVD_P5MIN_REGIONSOLUTION_ALL_202401010000.CSV", "README.txt"]
    );

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.downloads_succeeded, 1);
    assert_eq!(snapshot.archives_extracted, 1);
}

#[tokio::test]
async fn test_plain_file_is_written_as_is() {
    let server = MockServer::start(vec![("/files/notes.CSV".to_string(), vec![Reply::ok("a,b\n1,2\n")])]).await;
    let dir = TempDir::new().unwrap();

    let outcome = fetch_and_extract(
        &session(),
        &server.link("/files/notes.CSV"),
        dir.path(),
        &fast_backoff(5),
        &Metrics::new(),
    )
    .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.bytes, 8);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("notes.CSV")).unwrap(),
        "a,b\n1,2\n"
    );
}

#[tokio::test]
async fn test_forbidden_then_ok_succeeds() {
    let server = MockServer::start(vec![(
        REGION_ZIP.to_string(),
        vec![Reply::status(403), Reply::status(403), Reply::ok(region_archive())],
    )])
    .await;
    let dir = TempDir::new().unwrap();
    let metrics = Metrics::new();

    let outcome = fetch_and_extract(
        &session(),
        &server.link(REGION_ZIP),
        dir.path(),
        &fast_backoff(5),
        &metrics,
    )
    .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts, 3);
    assert_eq!(server.hits(REGION_ZIP), 3);
    assert_eq!(metrics.snapshot().retries, 2);
    assert!(dir.path().join("README.txt").exists());
}

#[tokio::test]
async fn test_backoff_grows_between_attempts() {
    let server = MockServer::start(vec![(
        REGION_ZIP.to_string(),
        vec![Reply::status(403), Reply::status(403), Reply::ok(region_archive())],
    )])
    .await;
    let dir = TempDir::new().unwrap();

    // sleeps 20ms * 2^1 then 20ms * 2^2
    let backoff = Backoff::new(5, 2.0, Duration::from_millis(20));
    let started = Instant::now();

    let outcome = fetch_and_extract(
        &session(),
        &server.link(REGION_ZIP),
        dir.path(),
        &backoff,
        &Metrics::new(),
    )
    .await;

    assert!(outcome.is_success());
    assert!(started.elapsed() >= Duration::from_millis(120));
}

#[tokio::test]
async fn test_exhausted_attempts_report_failure() {
    let server = MockServer::start(vec![(REGION_ZIP.to_string(), vec![Reply::status(403)])]).await;
    let dir = TempDir::new().unwrap();
    let metrics = Metrics::new();

    let outcome = fetch_and_extract(
        &session(),
        &server.link(REGION_ZIP),
        dir.path(),
        &fast_backoff(3),
        &metrics,
    )
    .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.link, server.link(REGION_ZIP));
    assert_eq!(outcome.attempts, 3);
    assert_eq!(server.hits(REGION_ZIP), 3);
    assert!(matches!(
        outcome.error,
        Some(FetchError::Exhausted {
            attempts: 3,
            last: DownloadError::Status { code: 403, .. }
        })
    ));
    assert!(files_in(dir.path()).is_empty());
    assert_eq!(metrics.snapshot().downloads_failed, 1);
}

#[tokio::test]
async fn test_server_errors_use_same_retry_policy() {
    let server = MockServer::start(vec![(
        REGION_ZIP.to_string(),
        vec![Reply::status(500), Reply::status(404), Reply::ok(region_archive())],
    )])
    .await;
    let dir = TempDir::new().unwrap();

    let outcome = fetch_and_extract(
        &session(),
        &server.link(REGION_ZIP),
        dir.path(),
        &fast_backoff(5),
        &Metrics::new(),
    )
    .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts, 3);
}

#[tokio::test]
async fn test_connection_refused_is_retried_then_fails() {
    // grab a free port and close it again
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = TempDir::new().unwrap();
    let link = format!("http://{addr}/files/gone.zip");

    let outcome = fetch_and_extract(&session(), &link, dir.path(), &fast_backoff(2), &Metrics::new()).await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.attempts, 2);
    assert!(matches!(
        outcome.error,
        Some(FetchError::Exhausted { attempts: 2, .. })
    ));
}

#[tokio::test]
async fn test_corrupt_archive_fails_without_retry() {
    let server = MockServer::start(vec![(
        "/files/broken.zip".to_string(),
        vec![Reply::ok("definitely not a zip archive")],
    )])
    .await;
    let dir = TempDir::new().unwrap();

    let outcome = fetch_and_extract(
        &session(),
        &server.link("/files/broken.zip"),
        dir.path(),
        &fast_backoff(5),
        &Metrics::new(),
    )
    .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.attempts, 1);
    assert_eq!(server.hits("/files/broken.zip"), 1);
    assert!(matches!(outcome.error, Some(FetchError::Extract(_))));
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_write_failure_fails_without_retry() {
    let server = MockServer::start(vec![(REGION_ZIP.to_string(), vec![Reply::ok(region_archive())])]).await;
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does").join("not").join("exist");

    let outcome = fetch_and_extract(
        &session(),
        &server.link(REGION_ZIP),
        &missing,
        &fast_backoff(5),
        &Metrics::new(),
    )
    .await;

    assert!(!outcome.is_success());
    assert_eq!(server.hits(REGION_ZIP), 1);
    assert!(matches!(outcome.error, Some(FetchError::Write { .. })));
}

#[tokio::test]
async fn test_pool_bounds_in_flight_downloads() {
    let paths: Vec<String> = (0..10)
        .map(|i| format!("/files/PUBLIC_DVD_P5MIN_REGIONSOLUTION_ALL_2024010{i}0000.zip"))
        .collect();
    let routes = paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let member = format!("MEMBER_{i}.CSV");
            let body = zip_bytes(&[(member.as_str(), "x\n")]);
            (path.clone(), vec![Reply::ok(body).delayed(Duration::from_millis(50))])
        })
        .collect();
    let server = MockServer::start(routes).await;
    let dir = TempDir::new().unwrap();

    let pool = WorkerPool::new(
        Arc::new(session()),
        Arc::new(Metrics::new()),
        WorkerConfig {
            max_inflight_tasks: 3,
            backoff: fast_backoff(5),
        },
    );

    let links = paths.iter().map(|p| server.link(p)).collect();
    let outcomes = pool.run(links, dir.path()).await;

    assert_eq!(outcomes.len(), 10);
    assert!(outcomes.iter().all(|o| o.is_success()));
    assert!(server.max_in_flight() <= 3, "max in flight {}", server.max_in_flight());
    assert!(server.max_in_flight() >= 2, "max in flight {}", server.max_in_flight());
    assert_eq!(files_in(dir.path()).len(), 10);
}

#[tokio::test]
async fn test_pool_failure_does_not_halt_batch() {
    let server = MockServer::start(vec![
        ("/files/good_1.zip".to_string(), vec![Reply::ok(zip_bytes(&[("GOOD_1.CSV", "1")]))]),
        ("/files/bad.zip".to_string(), vec![Reply::status(503)]),
        ("/files/good_2.zip".to_string(), vec![Reply::ok(zip_bytes(&[("GOOD_2.CSV", "2")]))]),
    ])
    .await;
    let dir = TempDir::new().unwrap();
    let metrics = Arc::new(Metrics::new());

    let pool = WorkerPool::new(
        Arc::new(session()),
        Arc::clone(&metrics),
        WorkerConfig {
            max_inflight_tasks: 1,
            backoff: fast_backoff(2),
        },
    );

    let links = vec![
        server.link("/files/good_1.zip"),
        server.link("/files/bad.zip"),
        server.link("/files/good_2.zip"),
    ];
    let outcomes = pool.run(links, dir.path()).await;

    let failed: Vec<_> = outcomes
        .iter()
        .filter(|o| !o.is_success())
        .map(|o| o.link.clone())
        .collect();
    assert_eq!(failed, vec![server.link("/files/bad.zip")]);
    assert_eq!(files_in(dir.path()), vec!["GOOD_1.CSV", "GOOD_2.CSV"]);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.downloads_succeeded, 2);
    assert_eq!(snapshot.downloads_failed, 1);
}

#[tokio::test]
async fn test_session_rate_limit_spaces_requests() {
    let server = MockServer::start(vec![("/files/notes.CSV".to_string(), vec![Reply::ok("x")])]).await;
    let config = HttpConfig {
        request_timeout: Duration::from_secs(10),
        max_requests_per_second: Some(2),
        ..HttpConfig::default()
    };
    let session = HttpSession::new(&config).unwrap();
    let link = server.link("/files/notes.CSV");

    let started = Instant::now();
    for _ in 0..5 {
        session.fetch_bytes(&link).await.unwrap();
    }

    // burst of two, then one every 500ms
    assert!(
        started.elapsed() >= Duration::from_millis(1400),
        "finished in {:?}",
        started.elapsed()
    );
    assert_eq!(server.hits("/files/notes.CSV"), 5);
}
