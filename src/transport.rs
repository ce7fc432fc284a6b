use std::io::Read;

use crate::ergast::USER_AGENT;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// A blocking GET. Non-2xx statuses are responses, not errors; only failures to
/// get any response at all are returned as `Err`.
pub trait Transport {
    fn get(&self, url: &str) -> Result<HttpResponse>;
}

pub struct UreqTransport {
    timeout_millis: u64,
}

impl UreqTransport {
    pub fn new(timeout_secs: u64) -> UreqTransport {
        UreqTransport {
            timeout_millis: timeout_secs.saturating_mul(1000),
        }
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = ureq::get(url)
            .set("User-Agent", USER_AGENT)
            .timeout_connect(self.timeout_millis)
            .timeout_read(self.timeout_millis)
            .call();

        if let Some(error) = response.synthetic_error() {
            return Err(Error::Transport {
                url: url.to_owned(),
                message: error.to_string(),
            });
        }

        let status = response.status();
        let mut body = Vec::new();
        response.into_reader().read_to_end(&mut body).map_err(|e| Error::Transport {
            url: url.to_owned(),
            message: format!("failed reading response body: {}", e),
        })?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
fn serve_once(raw_response: &'static str) -> String {
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = [0u8; 1024];
        let _ = stream.read(&mut request);
        stream.write_all(raw_response.as_bytes()).unwrap();
    });

    format!("http://{}/2020/drivers", address)
}

#[test]
fn test_ureq_transport_returns_error_status() {
    let url = serve_once("HTTP/1.1 500 Internal Server Error\r\nContent-Length: 4\r\nConnection: close\r\n\r\noops");

    let response = UreqTransport::new(5).get(&url).unwrap();
    assert_eq!(response.status, 500);
    assert_eq!(response.body, b"oops".to_vec());
}

#[test]
fn test_ureq_transport_connection_refused() {
    let url = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}/2020/drivers", listener.local_addr().unwrap())
    };

    match UreqTransport::new(5).get(&url) {
        Err(Error::Transport { url: failed, .. }) => assert_eq!(failed, url),
        other => panic!("expected a transport error, got {:?}", other),
    }
}
