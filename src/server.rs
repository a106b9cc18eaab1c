//! Optional localhost HTTP admin surface (`--listen`).
//!
//! A deliberately small HTTP/1.1 endpoint over a plain TCP listener:
//! `GET /` returns the session state as JSON, `POST /` applies a
//! `+`-separated action list (e.g. `change-query(foo)+first+accept`).
//! Requests are size-capped, deadline-bound, and optionally guarded by
//! an `X-API-Key` header compared in constant time against the
//! `SIFT_API_KEY` environment secret.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ServerError;
use crate::terminal::{Action, Terminal};

/// Environment variable holding the shared API secret.
pub const API_KEY_ENV: &str = "SIFT_API_KEY";

/// Maximum accepted request body.
const MAX_BODY: usize = 1024 * 1024;
/// Per-connection read deadline.
const READ_DEADLINE: Duration = Duration::from_secs(10);

/// Binds the listener on localhost and spawns the serve loop. Returns
/// the bound port (useful with port 0).
pub fn start(port: u16, terminal: Arc<Terminal>) -> Result<(u16, JoinHandle<()>), ServerError> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .map_err(|source| ServerError::Bind { port, source })?;
    let bound = listener.local_addr().map(|a| a.port()).unwrap_or(port);
    let api_key = std::env::var(API_KEY_ENV).ok();
    let handle = std::thread::Builder::new()
        .name("sift-listen".to_string())
        .spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => handle_connection(stream, &terminal, api_key.as_deref()),
                    Err(e) => warn!(error = %e, "listener accept failed"),
                }
            }
        })
        .unwrap_or_else(|_| std::process::abort());
    Ok((bound, handle))
}

#[derive(Serialize)]
struct Status {
    query: String,
    reading: bool,
    total: usize,
    matched: usize,
    selected: usize,
    current: Option<String>,
}

fn handle_connection(stream: TcpStream, terminal: &Arc<Terminal>, api_key: Option<&str>) {
    if let Err(e) = stream.set_read_timeout(Some(READ_DEADLINE)) {
        warn!(error = %e, "deadline setup failed");
        return;
    }
    let mut reader = BufReader::new(stream);
    let response = match read_request(&mut reader) {
        Ok(request) => respond(&request, terminal, api_key),
        Err(status) => Response::error(status),
    };
    let mut stream = reader.into_inner();
    let _ = stream.write_all(response.render().as_bytes());
}

struct Request {
    method: String,
    path: String,
    api_key: Option<String>,
    body: String,
}

struct Response {
    status: u16,
    body: String,
}

impl Response {
    fn ok(body: String) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16) -> Self {
        let reason = match status {
            400 => "bad request",
            401 => "unauthorized",
            _ => "error",
        };
        Self {
            status,
            body: format!("{{\"error\":\"{reason}\"}}"),
        }
    }

    fn render(&self) -> String {
        let reason = match self.status {
            200 => "OK",
            400 => "Bad Request",
            401 => "Unauthorized",
            _ => "Error",
        };
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status,
            reason,
            self.body.len(),
            self.body
        )
    }
}

/// Parses the request line, headers, and a `Content-Length`-framed
/// body. Returns the HTTP status to answer on malformed input.
fn read_request(reader: &mut BufReader<TcpStream>) -> Result<Request, u16> {
    let mut line = String::new();
    reader.read_line(&mut line).map_err(|_| 400u16)?;
    let mut parts = line.split_whitespace();
    let method = parts.next().ok_or(400u16)?.to_string();
    let path = parts.next().ok_or(400u16)?.to_string();

    let mut content_length = 0usize;
    let mut api_key = None;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).map_err(|_| 400u16)?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        let Some((name, value)) = header.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse().map_err(|_| 400u16)?;
        } else if name.eq_ignore_ascii_case("x-api-key") {
            api_key = Some(value.to_string());
        }
    }

    if content_length > MAX_BODY {
        return Err(400u16);
    }
    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).map_err(|_| 400u16)?;
    }
    Ok(Request {
        method,
        path,
        api_key,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn respond(request: &Request, terminal: &Arc<Terminal>, api_key: Option<&str>) -> Response {
    if let Some(secret) = api_key {
        let presented = request.api_key.as_deref().unwrap_or("");
        if !constant_time_eq(presented.as_bytes(), secret.as_bytes()) {
            return Response::error(401);
        }
    }
    if request.path != "/" {
        return Response::error(400);
    }
    match request.method.as_str() {
        "GET" => {
            let (query, reading, total, matched, selected, current) = terminal.status();
            let status = Status {
                query,
                reading,
                total,
                matched,
                selected,
                current,
            };
            match serde_json::to_string(&status) {
                Ok(body) => Response::ok(body),
                Err(_) => Response::error(400),
            }
        }
        "POST" => {
            let mut actions = Vec::new();
            for part in request.body.split('+').filter(|p| !p.trim().is_empty()) {
                match Action::parse(part) {
                    Some(action) => actions.push(action),
                    None => return Response::error(400),
                }
            }
            if actions.is_empty() {
                return Response::error(400);
            }
            debug!(count = actions.len(), "applying admin actions");
            terminal.post_actions(&actions);
            Response::ok("{\"ok\":true}".to_string())
        }
        _ => Response::error(400),
    }
}

/// Length-aware constant-time byte comparison: the running time does
/// not depend on where the inputs differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::event::EventBox;
    use crate::terminal::TermConfig;

    fn serve() -> (u16, Arc<Terminal>) {
        let global = Arc::new(EventBox::new());
        let terminal = Terminal::new(TermConfig::default(), global);
        let (port, _handle) = start(0, Arc::clone(&terminal))
            .unwrap_or_else(|e| panic!("server start failed: {e}"));
        (port, terminal)
    }

    fn roundtrip(port: u16, request: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port))
            .unwrap_or_else(|e| panic!("connect failed: {e}"));
        stream
            .write_all(request.as_bytes())
            .unwrap_or_else(|e| panic!("write failed: {e}"));
        let mut response = String::new();
        let _ = stream.read_to_string(&mut response);
        response
    }

    #[test]
    fn test_get_returns_status_json() {
        let (port, _terminal) = serve();
        let response = roundtrip(port, "GET / HTTP/1.1\r\n\r\n");
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("\"matched\":0"));
        assert!(response.contains("\"query\":\"\""));
    }

    #[test]
    fn test_post_applies_actions() {
        let (port, terminal) = serve();
        let body = "change-query(abc)";
        let request = format!(
            "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let response = roundtrip(port, &request);
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(terminal.query(), "abc");
    }

    #[test]
    fn test_post_unknown_action_is_bad_request() {
        let (port, _terminal) = serve();
        let body = "explode";
        let request = format!(
            "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let response = roundtrip(port, &request);
        assert!(response.starts_with("HTTP/1.1 400"));
    }

    #[test]
    fn test_oversized_body_is_rejected() {
        let (port, _terminal) = serve();
        let request = format!("POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n", MAX_BODY + 1);
        let response = roundtrip(port, &request);
        assert!(response.starts_with("HTTP/1.1 400"));
    }

    #[test]
    fn test_unknown_path_is_bad_request() {
        let (port, _terminal) = serve();
        let response = roundtrip(port, "GET /items HTTP/1.1\r\n\r\n");
        assert!(response.starts_with("HTTP/1.1 400"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secrex"));
        assert!(!constant_time_eq(b"short", b"longer"));
        assert!(constant_time_eq(b"", b""));
    }
}
