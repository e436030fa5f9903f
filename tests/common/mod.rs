// SPDX-License-Identifier: GPL-3.0-only

//! Shared fixtures for integration tests
//!
//! [`StubClassifier`] is a tiny HTTP/1.1 server on a loopback port that
//! answers each request with a scripted response and records what it was
//! sent.

#![allow(dead_code)]

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{Rgb, RgbImage};
use sign_camera::Config;
use sign_camera::backends::camera::StillImageCamera;
use sign_camera::backends::gallery::GalleryProvider;
use sign_camera::backends::permissions::StaticPermission;
use sign_camera::pipelines::inference::{ImageAcquirer, InferenceClient};
use sign_camera::session::{Session, SessionSnapshot};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What the stub does with one request
#[derive(Debug, Clone)]
pub enum Reply {
    Json { status: u16, body: String, delay: Duration },
    /// Close the connection without answering
    Hangup,
}

impl Reply {
    pub fn ok(label: &str, confidence: f64) -> Self {
        Self::status(
            200,
            serde_json::json!({ "result": label, "confidence": confidence }).to_string(),
        )
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Reply::Json {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(self, by: Duration) -> Self {
        match self {
            Reply::Json { status, body, .. } => Reply::Json { status, body, delay: by },
            Reply::Hangup => Reply::Hangup,
        }
    }
}

/// One request as the stub received it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub content_type: Option<String>,
    pub body: serde_json::Value,
}

impl Recorded {
    /// Decoded dimensions of the uploaded image
    pub fn image_dimensions(&self) -> (u32, u32) {
        let payload = self.body["image"].as_str().expect("image field");
        let bytes = STANDARD.decode(payload).expect("base64 payload");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8], "payload should be a JPEG");
        let decoded = image::load_from_memory(&bytes).expect("decodable JPEG");
        (decoded.width(), decoded.height())
    }
}

pub struct StubClassifier {
    pub url: String,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl StubClassifier {
    /// Serve `replies` in order; the last one repeats
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let url = format!("http://{}/predict", listener.local_addr().expect("addr"));
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let served = Arc::new(AtomicUsize::new(0));

        let (rec, act, max) = (recorded.clone(), active.clone(), max_active.clone());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let index = served.fetch_add(1, Ordering::SeqCst);
                let reply = replies
                    .get(index)
                    .or_else(|| replies.last())
                    .cloned()
                    .unwrap_or(Reply::Hangup);
                let (rec, act, max) = (rec.clone(), act.clone(), max.clone());
                tokio::spawn(async move {
                    let now = act.fetch_add(1, Ordering::SeqCst) + 1;
                    max.fetch_max(now, Ordering::SeqCst);
                    handle(stream, reply, rec, act).await;
                });
            }
        });

        Self {
            url,
            recorded,
            active,
            max_active,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    /// Most requests ever handled at the same time
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

/// Serve one connection
///
/// `active` is released before the answer goes out, so a client that sends
/// its next request only after reading this answer is never counted twice.
async fn handle(
    mut stream: TcpStream,
    reply: Reply,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    active: Arc<AtomicUsize>,
) {
    let request = read_request(&mut stream).await;
    if let Some(request) = request {
        recorded.lock().unwrap().push(request);
    }

    match reply {
        Reply::Hangup => {
            active.fetch_sub(1, Ordering::SeqCst);
        }
        Reply::Json { status, body, delay } => {
            tokio::time::sleep(delay).await;
            active.fetch_sub(1, Ordering::SeqCst);
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                if status == 200 { "OK" } else { "Error" },
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<Recorded> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
        }
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let header = |name: &str| {
        head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    };
    let length: usize = header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    while buffer.len() < header_end + length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
        }
    }

    let body = serde_json::from_slice(&buffer[header_end..header_end + length])
        .unwrap_or(serde_json::Value::Null);
    Some(Recorded {
        content_type: header("content-type"),
        body,
    })
}

/// A 640x360 gradient frame
pub fn frame() -> RgbImage {
    RgbImage::from_fn(640, 360, |x, y| Rgb([(x / 3) as u8, (y / 2) as u8, 120]))
}

pub fn config_for(stub: &StubClassifier) -> Config {
    Config {
        endpoint: stub.url.clone(),
        request_timeout_ms: 2_000,
        loop_interval_ms: 10,
        ..Config::default()
    }
}

/// Started session with a still-image camera and the given gallery
pub async fn session_with(config: &Config, gallery: Option<Box<dyn GalleryProvider>>) -> Session {
    let client = InferenceClient::from_config(config).expect("client");
    let mut acquirer = ImageAcquirer::from_config(config)
        .with_camera(Box::new(StillImageCamera::from_image("test-camera", frame())));
    if let Some(gallery) = gallery {
        acquirer = acquirer.with_gallery(gallery);
    }
    let session = Session::new(acquirer, Arc::new(client), config);
    session.initialize(&mut StaticPermission::granted()).await;
    assert!(session.start());
    session
}

/// Poll until `predicate` holds or panic after five seconds
pub async fn wait_for(session: &Session, predicate: impl Fn(&SessionSnapshot) -> bool) -> SessionSnapshot {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = session.snapshot();
            if predicate(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("session never reached the expected state")
}
