//! Shared fixtures for the worker integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use uptime_worker::alerts::{AlertError, AlertTransport};
use uptime_worker::checks::Check;
use uptime_worker::monitoring::{Outcome, Prober};

pub const CHECK_ID: &str = "abcdefghij0123456789";
pub const OTHER_CHECK_ID: &str = "0123456789abcdefghij";
pub const PHONE: &str = "+441234567890";
pub const T0: i64 = 1_700_000_000_000;

/// How the stub answers each connection
#[derive(Debug, Clone, Copy)]
pub enum StubBehavior {
    Status(u16),
    /// Accept and never answer
    Hang,
}

/// Minimal HTTP/1.1 server on localhost
pub struct StubServer {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn_stub(behavior: StubBehavior) -> StubServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);

    let handle = tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                seen.lock().unwrap().push(request);

                match behavior {
                    StubBehavior::Status(code) => {
                        let response = format!(
                            "HTTP/1.1 {code} Stub\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    }
                    StubBehavior::Hang => {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                    }
                }
            });
        }
    });

    StubServer { addr, requests, handle }
}

/// Read head and (content-length) body of one request
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let body_len = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse().ok())?
                })
                .unwrap_or(0usize);
            if buf.len() >= head_end + 4 + body_len {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}

/// Raw stored record for a check, as the CRUD layer would write it
pub fn check_record(id: &str, url: &str) -> Value {
    json!({
        "id": id,
        "userPhone": PHONE,
        "protocol": "http",
        "url": url,
        "method": "get",
        "successCodes": [200],
        "timeoutSeconds": 3,
    })
}

/// Prober that replays a fixed script of outcomes
pub struct ScriptedProber {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    pub calls: AtomicUsize,
}

impl ScriptedProber {
    pub fn always(outcome: Outcome) -> Self {
        Self { script: Mutex::new(VecDeque::new()), fallback: outcome, calls: AtomicUsize::new(0) }
    }

    pub fn sequence(outcomes: Vec<Outcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            fallback: Outcome::timeout(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, _check: &Check) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

/// Alert transport that remembers what it was asked to send
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self { sent: Mutex::new(Vec::new()), fail: true }
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertTransport for RecordingTransport {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), AlertError> {
        self.sent.lock().unwrap().push((recipient.to_string(), message.to_string()));
        if self.fail {
            return Err(AlertError::SendFailed("gateway down".to_string()));
        }
        Ok(())
    }
}
