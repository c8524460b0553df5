#![allow(dead_code)]

use ndarray::Array2;
use sarprep::io::{AccessToken, ImageryProvider, ProviderResponse};
use sarprep::{EnhancedImagery, ImageryRequestSpec, SarError, SarResult};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Deterministic speckled test raster encoded as PNG
pub fn png_bytes(width: usize, height: usize) -> Vec<u8> {
    let pixels = Array2::from_shape_fn((height, width), |(i, j)| match (i * 31 + j * 17) % 23 {
        0 => 255,
        1 => 0,
        _ => ((i * 5 + j * 3) % 180) as u8 + 30,
    });
    EnhancedImagery { pixels }.to_png().expect("encode test PNG")
}

/// Multi-part body with the given (content type, payload) parts
pub fn multipart_body(boundary: &str, parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (content_type, content) in parts {
        body.extend_from_slice(format!("--{}\r\nContent-Type: {}\r\n\r\n", boundary, content_type).as_bytes());
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

// ============================================================================
// Scripted provider
// ============================================================================

type FetchFailure = Box<dyn Fn() -> SarError + Send + Sync>;

/// Provider double that replays a fixed outcome and records calls
pub struct ScriptedProvider {
    auth_failure_status: Option<u16>,
    fetch_failure: Option<FetchFailure>,
    response: ProviderResponse,
    calls: Mutex<Vec<String>>,
    last_spec: Mutex<Option<ImageryRequestSpec>>,
}

impl ScriptedProvider {
    pub fn returning(content_type: &str, body: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            auth_failure_status: None,
            fetch_failure: None,
            response: ProviderResponse {
                content_type: content_type.to_string(),
                body,
            },
            calls: Mutex::new(Vec::new()),
            last_spec: Mutex::new(None),
        })
    }

    pub fn png(width: usize, height: usize) -> Arc<Self> {
        Self::returning("image/png", png_bytes(width, height))
    }

    pub fn failing_auth(status: u16) -> Arc<Self> {
        Arc::new(Self {
            auth_failure_status: Some(status),
            fetch_failure: None,
            response: ProviderResponse {
                content_type: "image/png".to_string(),
                body: Vec::new(),
            },
            calls: Mutex::new(Vec::new()),
            last_spec: Mutex::new(None),
        })
    }

    /// Authenticates, then fails every fetch with the error `make` builds
    pub fn failing_fetch(make: impl Fn() -> SarError + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            auth_failure_status: None,
            fetch_failure: Some(Box::new(make)),
            response: ProviderResponse {
                content_type: "image/png".to_string(),
                body: Vec::new(),
            },
            calls: Mutex::new(Vec::new()),
            last_spec: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_spec(&self) -> Option<ImageryRequestSpec> {
        self.last_spec.lock().unwrap().clone()
    }
}

impl ImageryProvider for ScriptedProvider {
    fn authenticate(&self) -> SarResult<AccessToken> {
        self.calls.lock().unwrap().push("authenticate".to_string());
        match self.auth_failure_status {
            Some(status) => Err(SarError::Auth(format!("HTTP {}", status))),
            None => Ok(AccessToken::new("test-token")),
        }
    }

    fn fetch_imagery(&self, spec: &ImageryRequestSpec, token: &AccessToken) -> SarResult<ProviderResponse> {
        assert_eq!(token.as_str(), "test-token");
        self.calls.lock().unwrap().push("fetch_imagery".to_string());
        *self.last_spec.lock().unwrap() = Some(spec.clone());
        match &self.fetch_failure {
            Some(make) => Err(make()),
            None => Ok(self.response.clone()),
        }
    }
}

// ============================================================================
// In-process HTTP stub
// ============================================================================

#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    pub delay: Option<Duration>,
    /// Announce more body than is sent, then hold the connection open
    pub stall: Option<Duration>,
}

impl CannedResponse {
    pub fn new(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.to_string(),
            body: body.into(),
            delay: None,
            stall: None,
        }
    }

    pub fn json(status: u16, body: &str) -> Self {
        Self::new(status, "application/json", body.as_bytes().to_vec())
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn stalled(mut self, stall: Duration) -> Self {
        self.stall = Some(stall);
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Minimal HTTP/1.1 server answering each path with a canned response
pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    pub fn start(routes: Vec<(&str, CannedResponse)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let routes: HashMap<String, CannedResponse> =
            routes.into_iter().map(|(path, response)| (path.to_string(), response)).collect();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                handle_connection(stream, &routes, &recorded);
            }
        });

        Self { base_url, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }
}

fn handle_connection(
    stream: TcpStream,
    routes: &HashMap<String, CannedResponse>,
    recorded: &Arc<Mutex<Vec<RecordedRequest>>>,
) {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("").to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    if reader.read_exact(&mut body).is_err() {
        return;
    }

    recorded.lock().unwrap().push(RecordedRequest {
        method,
        path: path.clone(),
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    });

    let response = routes
        .get(&path)
        .cloned()
        .unwrap_or_else(|| CannedResponse::json(404, r#"{"error":"not found"}"#));
    if let Some(delay) = response.delay {
        std::thread::sleep(delay);
    }

    let mut stream = reader.into_inner();
    let announced = response.body.len() + if response.stall.is_some() { 100 } else { 0 };
    let head = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status, response.content_type, announced
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&response.body);
    let _ = stream.flush();
    if let Some(stall) = response.stall {
        std::thread::sleep(stall);
    }
}
