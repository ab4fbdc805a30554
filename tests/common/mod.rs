//! Scripted HTTP server and fixtures shared by the integration tests
#![allow(dead_code)]

use axum::{
    Router,
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use nemfetch::config::Config;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

/// One scripted answer; the last reply of a route repeats forever
#[derive(Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Vec<u8>,
    pub delay: Duration,
}

impl Reply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
struct Script {
    routes: Mutex<HashMap<String, Vec<Reply>>>,
    hits: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

pub struct MockServer {
    pub url: String,
    script: Arc<Script>,
}

impl MockServer {
    pub async fn start(routes: Vec<(String, Vec<Reply>)>) -> Self {
        let script = Arc::new(Script {
            routes: Mutex::new(routes.into_iter().collect()),
            ..Script::default()
        });

        let app = Router::new()
            .fallback(serve)
            .with_state(Arc::clone(&script));

        // Bind to random available port
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        let bound_addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", bound_addr),
            script,
        }
    }

    pub fn link(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.script
            .hits
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.script.max_in_flight.load(Ordering::SeqCst)
    }
}

async fn serve(State(script): State<Arc<Script>>, uri: Uri) -> Response {
    let path = uri.path().to_string();

    let hit = {
        let mut hits = script.hits.lock().unwrap();
        let count = hits.entry(path.clone()).or_insert(0);
        *count += 1;
        *count
    };

    let reply = {
        let routes = script.routes.lock().unwrap();
        routes
            .get(&path)
            .map(|replies| replies[(hit - 1).min(replies.len() - 1)].clone())
    };

    let Some(reply) = reply else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let now = script.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    script.max_in_flight.fetch_max(now, Ordering::SeqCst);
    if !reply.delay.is_zero() {
        sleep(reply.delay).await;
    }
    script.in_flight.fetch_sub(1, Ordering::SeqCst);

    (StatusCode::from_u16(reply.status).unwrap(), reply.body).into_response()
}

/// Zip archive held in memory
pub fn zip_bytes(members: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in members {
        writer
            .start_file(*name, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Directory-index style page linking every href
pub fn listing_html(hrefs: &[&str]) -> String {
    let anchors: String = hrefs
        .iter()
        .map(|href| format!("<a href=\"{href}\">{href}</a><br>\n"))
        .collect();
    format!("<html><head><title>index</title></head><body><pre>\n<a href=\"/\">[To Parent Directory]</a><br>\n{anchors}</pre></body></html>")
}

/// Listing page path on the mock server for one month
pub fn listing_path(year: i32, month: u32) -> String {
    format!("/MMSDM/{year}/MMSDM_{year}_{month:02}/MMSDM_Historical_Data_SQLLoader/P5MIN_ALL_DATA/")
}

/// Config pointed at the mock server with millisecond backoff
pub fn test_config(server: &MockServer, dest: &Path) -> Config {
    let mut config = Config::default();
    config.source.base_url = server.url.clone();
    config.source.archive_root = format!("{}/MMSDM/", server.url);
    config.download.output_path = dest.to_path_buf();
    config.download.backoff_unit_ms = 1;
    config.download.request_timeout_secs = 10;
    config.discovery.retry_backoff_ms = 1;
    config
}

/// Names of the regular files directly inside `dir`, sorted
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
