//! Shared HTTP agent and size-bounded response readers used by dataset acquisition.

use std::io::{self, Read, Write};
use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(120);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("dynprice/", env!("CARGO_PKG_VERSION"));
/// Error bodies are only quoted, never parsed.
const MAX_ERROR_BODY_BYTES: usize = 4 * 1024;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("Failed to read response body: {0}")]
    Body(#[from] io::Error),
}

/// Shared agent. The generous read timeout covers slow archive downloads.
pub(crate) fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(WRITE_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
    })
}

/// Issue a GET and stream a successful body into `writer`, up to `max_bytes`.
///
/// Non-2xx statuses become [`FetchError::Status`] carrying a short excerpt of the body.
pub(crate) fn download_to_writer(
    url: &str,
    authorization: Option<&str>,
    writer: &mut impl Write,
    max_bytes: usize,
) -> Result<(), FetchError> {
    let mut request = agent().get(url);
    if let Some(value) = authorization {
        request = request.set("Authorization", value);
    }
    let response = match request.call() {
        Ok(response) => response,
        Err(ureq::Error::Status(status, response)) => {
            let body = read_response_bytes(response, MAX_ERROR_BODY_BYTES)
                .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
                .unwrap_or_default();
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
                body,
            });
        }
        Err(err) => {
            return Err(FetchError::Transport {
                url: url.to_string(),
                reason: err.to_string(),
            });
        }
    };
    copy_response_to_writer(response, writer, max_bytes)?;
    Ok(())
}

/// Read a response into memory, enforcing a maximum byte size.
fn read_response_bytes(
    response: ureq::Response,
    max_bytes: usize,
) -> Result<Vec<u8>, io::Error> {
    check_content_length(&response, max_bytes)?;
    let reader = response.into_reader();
    let mut limited = reader.take(max_bytes as u64 + 1);
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes)?;
    if bytes.len() > max_bytes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Response exceeded {max_bytes} bytes"),
        ));
    }
    Ok(bytes)
}

/// Stream a response to the provided writer, enforcing a maximum byte size.
fn copy_response_to_writer(
    response: ureq::Response,
    writer: &mut impl Write,
    max_bytes: usize,
) -> Result<(), io::Error> {
    check_content_length(&response, max_bytes)?;
    let reader = response.into_reader();
    let mut limited = reader.take(max_bytes as u64 + 1);
    let mut total = 0usize;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = limited.read(&mut buf)?;
        if read == 0 {
            break;
        }
        total += read;
        if total > max_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Response exceeded {max_bytes} bytes"),
            ));
        }
        writer.write_all(&buf[..read])?;
    }
    Ok(())
}

fn check_content_length(response: &ureq::Response, max_bytes: usize) -> Result<(), io::Error> {
    let Some(length) = response.header("Content-Length") else {
        return Ok(());
    };
    let Ok(length) = length.parse::<u64>() else {
        return Ok(());
    };
    if length > max_bytes as u64 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Response too large: {length} bytes"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn serve_once(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{}", addr)
    }

    #[test]
    fn read_response_bytes_rejects_content_length_over_max() {
        let response = concat!(
            "HTTP/1.1 200 OK\r\n",
            "Content-Length: 100\r\n",
            "\r\n",
            "ok"
        )
        .to_string();
        let url = serve_once(response);
        let response = agent().get(&url).call().unwrap();
        let err = read_response_bytes(response, 10).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn read_response_bytes_rejects_body_over_max() {
        let body = "a".repeat(32);
        let response = format!("HTTP/1.0 200 OK\r\n\r\n{body}");
        let url = serve_once(response);
        let response = agent().get(&url).call().unwrap();
        let err = read_response_bytes(response, 16).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn read_response_bytes_accepts_under_limit() {
        let body = "hello";
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let url = serve_once(response);
        let response = agent().get(&url).call().unwrap();
        let bytes = read_response_bytes(response, 16).unwrap();
        assert_eq!(bytes, body.as_bytes());
    }

    #[test]
    fn copy_response_to_writer_streams_body() {
        let body = "price,freight_value\n1.0,2.0\n";
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let url = serve_once(response);
        let response = agent().get(&url).call().unwrap();
        let mut sink = Vec::new();
        copy_response_to_writer(response, &mut sink, 1024).unwrap();
        assert_eq!(sink, body.as_bytes());
    }

    #[test]
    fn copy_response_to_writer_stops_past_limit() {
        let body = "z".repeat(64);
        let response = format!("HTTP/1.0 200 OK\r\n\r\n{body}");
        let url = serve_once(response);
        let response = agent().get(&url).call().unwrap();
        let mut sink = Vec::new();
        let err = copy_response_to_writer(response, &mut sink, 32).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(sink.len() <= 32);
    }

    #[test]
    fn download_to_writer_reports_status_with_body_excerpt() {
        let body = "{\"message\":\"Not found\"}";
        let response = format!(
            "HTTP/1.1 404 Not Found\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let url = serve_once(response);
        let mut sink = Vec::new();
        let err = download_to_writer(&url, None, &mut sink, 1024).unwrap_err();
        match err {
            FetchError::Status { status, body, .. } => {
                assert_eq!(status, 404);
                assert!(body.contains("Not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(sink.is_empty());
    }

    #[test]
    fn download_to_writer_maps_refused_connection_to_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let mut sink = Vec::new();
        let err =
            download_to_writer(&format!("http://{addr}"), None, &mut sink, 16).unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
