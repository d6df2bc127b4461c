//! Shared helpers for integration tests

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::thread::{self, JoinHandle};

pub const FILE_REF: &str = "0123456789012345678901234567890123456789";

/// One-shot HTTP server answering a single request with `status` and `body`
///
/// The join handle yields the raw request head that was received.
pub struct TestServer {
    pub addr: SocketAddr,
    handle: JoinHandle<String>,
}

impl TestServer {
    pub fn start(status: &str, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let addr = listener.local_addr().expect("local addr");
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).expect("read request");
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).expect("write response");
            String::from_utf8_lossy(&request).into_owned()
        });

        Self { addr, handle }
    }

    /// Base URL ending in the profiles directory
    pub fn base_url(&self) -> String {
        format!("http://{}/cvpn/api/v1/profiles/", self.addr)
    }

    /// Request head received by the server
    pub fn request(self) -> String {
        self.handle.join().expect("server thread")
    }
}

/// Base URL of a port nothing listens on
pub fn refused_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{}/profiles/", addr)
}
