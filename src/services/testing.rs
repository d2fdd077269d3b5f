//! Test doubles: an in-memory `EpdApi` and a one-shot local HTTP server.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::services::api::{ApiResponse, EpdApi, PageQuery};

/// Scripted failure served before a page's normal response.
#[derive(Debug, Clone, Copy)]
pub enum Scripted {
    Status(u16),
    Timeout,
}

/// Serves fixed pages, with optional scripted failures per page.
#[derive(Default)]
pub struct ScriptedApi {
    total_pages: Option<u32>,
    discovery_status: Option<u16>,
    pages: HashMap<u32, Vec<Value>>,
    scripts: Mutex<HashMap<u32, VecDeque<Scripted>>>,
    calls: Mutex<Vec<Option<u32>>>,
}

impl ScriptedApi {
    pub fn new(total_pages: Option<u32>) -> Self {
        Self {
            total_pages,
            ..Self::default()
        }
    }

    pub fn with_discovery_status(mut self, status: u16) -> Self {
        self.discovery_status = Some(status);
        self
    }

    pub fn with_page(mut self, page: u32, records: Vec<Value>) -> Self {
        self.pages.insert(page, records);
        self
    }

    pub fn with_script(self, page: u32, script: Vec<Scripted>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(page, script.into_iter().collect());
        self
    }

    /// Page numbers requested, in order; discovery requests excluded.
    pub fn page_calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().iter().flatten().copied().collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl EpdApi for ScriptedApi {
    async fn list(&self, query: &PageQuery<'_>) -> Result<ApiResponse> {
        self.calls.lock().unwrap().push(query.page_number);

        let Some(page) = query.page_number else {
            return Ok(ApiResponse {
                status: self.discovery_status.unwrap_or(200),
                total_pages: self.total_pages,
                body: "[]".to_string(),
            });
        };

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&page)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(Scripted::Timeout) => Err(AppError::transient("operation timed out")),
            Some(Scripted::Status(status)) => Ok(ApiResponse {
                status,
                total_pages: self.total_pages,
                body: json!({"detail": format!("status {status}")}).to_string(),
            }),
            None => match self.pages.get(&page) {
                Some(records) => Ok(ApiResponse {
                    status: 200,
                    total_pages: self.total_pages,
                    body: Value::Array(records.clone()).to_string(),
                }),
                None => Ok(ApiResponse {
                    status: 404,
                    total_pages: self.total_pages,
                    body: json!({"detail": "Invalid page."}).to_string(),
                }),
            },
        }
    }
}

/// `count` minimal records tagged with their page.
pub fn records(page: u32, count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "material_id": format!("p{page}-{i}"),
                "name": format!("Product {page}/{i}"),
                "category": {"display_name": "Brick", "openepd_name": "Masonry"},
            })
        })
        .collect()
}

/// Request received by `serve_once`.
#[derive(Debug)]
pub struct CapturedRequest {
    pub head: String,
    pub body: String,
}

impl CapturedRequest {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }
}

/// Canned HTTP/1.1 response with a JSON body.
pub fn http_response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
    let extra: String = headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}\r\n"))
        .collect();
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n{extra}\r\n{body}",
        body.len()
    )
}

/// Accept one connection on 127.0.0.1 and answer it with `response`.
///
/// Returns an API root URL ending in `/api` and a handle yielding the
/// request that was received.
pub async fn serve_once(response: String) -> (String, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];

        let head_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before the request head");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
        let length = CapturedRequest {
            head: head.clone(),
            body: String::new(),
        }
        .header("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);

        while buf.len() < head_end + length {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let body = String::from_utf8_lossy(&buf[head_end..]).into_owned();

        stream.write_all(response.as_bytes()).await.unwrap();
        let _ = stream.shutdown().await;
        CapturedRequest { head, body }
    });

    (format!("http://{addr}/api"), handle)
}

/// Client that ignores proxy settings from the environment.
pub fn local_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
