//! Hand-rolled fake servers for exercising the backends over loopback.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::config::printer_config::{PrinterProtocol, PrinterTarget};

use super::ClientPolicy;

pub(crate) fn target(
    protocol: PrinterProtocol,
    addr: SocketAddr,
    api_key: Option<&str>,
) -> PrinterTarget {
    PrinterTarget::new(
        "127.0.0.1",
        addr.port(),
        protocol,
        api_key.map(|k| k.to_string()),
    )
}

/// Short budgets so failure-path tests finish quickly.
pub(crate) fn fast_policy() -> ClientPolicy {
    ClientPolicy {
        test_timeout: Duration::from_millis(800),
        status_timeout: Duration::from_millis(800),
        list_timeout: Duration::from_millis(800),
        start_timeout: Duration::from_millis(800),
        delete_timeout: Duration::from_millis(800),
        retry_backoff: Duration::from_millis(20),
    }
}

/// A port nothing is listening on.
pub(crate) async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// MARK: HTTP stub
/// Minimal scripted HTTP/1.1 responder. One response per connection, in
/// order; the last response repeats once the script runs out. Raw request
/// heads and bodies are captured for assertions.
pub(crate) struct HttpStub {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<String>>>,
}

pub(crate) async fn http_stub(responses: Vec<(u16, String)>) -> HttpStub {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let queue = Arc::new(Mutex::new(VecDeque::from(responses)));

    let reqs = requests.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let reqs = reqs.clone();
            let queue = queue.clone();
            tokio::spawn(async move {
                let _ = serve_http(stream, reqs, queue).await;
            });
        }
    });

    HttpStub { addr, requests }
}

async fn serve_http(
    mut stream: TcpStream,
    requests: Arc<Mutex<Vec<String>>>,
    queue: Arc<Mutex<VecDeque<(u16, String)>>>,
) -> Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        if buf.len() > 64 * 1024 {
            return Ok(());
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|l| {
            let (name, value) = l.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    requests
        .lock()
        .unwrap()
        .push(String::from_utf8_lossy(&buf).to_string());

    let (status, body) = {
        let mut q = queue.lock().unwrap();
        if q.len() > 1 {
            q.pop_front().unwrap()
        } else {
            q.front().cloned().unwrap_or((200, "{}".to_string()))
        }
    };

    let reason = match status {
        200 => "OK",
        204 => "No Content",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "Response",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    let _ = stream.shutdown().await;
    Ok(())
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// MARK: ACT stub
/// Scriptable line server speaking the ACT framing. The handler maps one
/// request line to a raw response (terminator included); `None` closes the
/// connection without replying.
pub(crate) type ActHandler = dyn Fn(&str) -> Option<String> + Send + Sync;

pub(crate) struct ActStub {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
}

impl ActStub {
    pub(crate) fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

pub(crate) async fn act_stub(handler: Arc<ActHandler>) -> ActStub {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));

    let conns = connections.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            conns.fetch_add(1, Ordering::SeqCst);
            let handler = handler.clone();
            tokio::spawn(async move {
                let _ = serve_act(stream, handler).await;
            });
        }
    });

    ActStub { addr, connections }
}

async fn serve_act(mut stream: TcpStream, handler: Arc<ActHandler>) -> Result<()> {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        while !buf.contains(&b'\n') {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let pos = buf.iter().position(|&b| b == b'\n').unwrap();
        let line_bytes: Vec<u8> = buf.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line_bytes).trim().to_string();

        match handler(&line) {
            Some(response) => {
                stream.write_all(response.as_bytes()).await?;
                stream.flush().await?;
            }
            None => {
                let _ = stream.shutdown().await;
                return Ok(());
            }
        }
    }
}
