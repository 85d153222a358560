//! Test helpers: fixture loading and a throwaway HTTP server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
}

pub struct TestServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Raw request heads received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Serve fixed bodies by path on 127.0.0.1; unknown paths get 404.
pub async fn serve(pages: Vec<(&str, String)>) -> TestServer {
    serve_delayed(pages, vec![]).await
}

/// Like [`serve`], but holds the response for the listed paths.
pub async fn serve_delayed(pages: Vec<(&str, String)>, delays: Vec<(&str, Duration)>) -> TestServer {
    let delays: Arc<HashMap<String, Duration>> =
        Arc::new(delays.into_iter().map(|(p, d)| (p.to_string(), d)).collect());
    let pages: Arc<HashMap<String, String>> =
        Arc::new(pages.into_iter().map(|(p, b)| (p.to_string(), b)).collect());
    let requests = Arc::new(Mutex::new(Vec::new()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let seen = Arc::clone(&requests);
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            let pages = Arc::clone(&pages);
            let seen = Arc::clone(&seen);
            let delays = Arc::clone(&delays);
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = sock.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&buf[..n]);
                    if head.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let head = String::from_utf8_lossy(&head).to_string();
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                seen.lock().unwrap().push(head);
                if let Some(delay) = delays.get(&path) {
                    tokio::time::sleep(*delay).await;
                }

                let response = match pages.get(&path) {
                    Some(body) => format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: text/html; charset=utf-8\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    ),
                    None => "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                        .to_string(),
                };
                let _ = sock.write_all(response.as_bytes()).await;
                let _ = sock.shutdown().await;
            });
        }
    });

    TestServer { addr, requests }
}
