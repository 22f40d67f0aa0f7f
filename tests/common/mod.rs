//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use upgrade_bridge::config::loader::parse_config;
use upgrade_bridge::{BridgeConfig, BridgeRuntime, HttpServer, Shutdown};

pub const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

/// Start a mock broker acceptor that writes `tag`, then echoes.
pub async fn start_broker(tag: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if socket.write_all(tag.as_bytes()).await.is_err() {
                    return;
                }
                let mut buf = [0u8; 1024];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if socket.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });
    addr
}

/// A bridge serving on an ephemeral port.
pub struct TestBridge {
    pub addr: SocketAddr,
    pub runtime: BridgeRuntime,
    pub shutdown: Shutdown,
}

impl Drop for TestBridge {
    fn drop(&mut self) {
        self.shutdown.trigger();
        self.runtime.stop();
    }
}

pub fn config(toml: &str) -> BridgeConfig {
    parse_config(toml).unwrap()
}

pub async fn start_bridge(config: &BridgeConfig) -> TestBridge {
    let runtime = BridgeRuntime::start(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(config.listener.name.as_str(), runtime.dispatch.clone());
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestBridge {
        addr,
        runtime,
        shutdown,
    }
}

/// Response head of a raw upgrade request plus the still-open socket.
pub struct UpgradeResponse {
    pub status: u16,
    pub head: String,
    pub stream: TcpStream,
}

impl UpgradeResponse {
    /// Value of `name` in the response head, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }

    /// Read exactly `len` tunnelled bytes.
    pub async fn read_bytes(&mut self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        tokio::time::timeout(Duration::from_secs(5), self.stream.read_exact(&mut buf))
            .await
            .expect("timed out reading tunnel")
            .unwrap();
        buf
    }
}

/// Send `GET /` asking to upgrade to `protocol`, with extra headers.
pub async fn send_upgrade(addr: SocketAddr, protocol: &str, headers: &[(&str, &str)]) -> UpgradeResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut request = format!("GET / HTTP/1.1\r\nHost: {addr}\r\nConnection: Upgrade\r\nUpgrade: {protocol}\r\n");
    for (name, value) in headers {
        request.push_str(&format!("{name}: {value}\r\n"));
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    // Byte at a time so no tunnelled data is consumed with the head.
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut byte))
            .await
            .expect("timed out reading response head")
            .unwrap();
        assert!(n > 0, "connection closed before response head");
        head.push(byte[0]);
    }

    let head = String::from_utf8(head).unwrap();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap();
    UpgradeResponse { status, head, stream }
}
