//! Reading and writing [`Request`]/[`Response`] values off an async byte
//! stream.
//!
//! Framing is deliberately narrow: header parsing is delegated to
//! `httparse`, and bodies are framed by `Content-Length` only — chunked
//! transfer-encoding is an explicit non-goal, so a chunked body is simply
//! treated as having no body to re-frame.

use std::io;

use bytes::BytesMut;
use http::{HeaderMap, HeaderName, HeaderValue};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::message::{Method, Request, Response, Version};

/// Fixed slot count for `httparse`'s header array. Requests with more
/// header fields than this are rejected as malformed.
const MAX_HEADERS: usize = 64;

/// Upper bound on the size of a request/response head (status line plus
/// headers) while it is still being accumulated. Guards against a
/// slow-loris peer that never sends a blank line.
const MAX_HEAD_BYTES: usize = 64 * 1024;

const READ_CHUNK: usize = 4096;

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn content_length(headers: &HeaderMap) -> usize {
    headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(0)
}

fn header_map_from(raw: &[httparse::Header<'_>]) -> io::Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for h in raw {
        if h.name.is_empty() {
            break;
        }
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|e| invalid_data(format!("bad header name: {e}")))?;
        let value = HeaderValue::from_bytes(h.value)
            .map_err(|e| invalid_data(format!("bad header value: {e}")))?;
        map.append(name, value);
    }
    Ok(map)
}

/// Reads one request head from `stream`, then its body if `Content-Length`
/// calls for one.
///
/// Returns `Ok(None)` if the peer closed the connection before sending any
/// bytes at all — the ordinary way a keep-alive connection ends. Any
/// partial request followed by EOF is an error, not a clean close.
pub async fn read_request<R>(stream: &mut R) -> io::Result<Option<Request>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    loop {
        let mut header_slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut header_slots);
        match parsed.parse(&buf) {
            Ok(httparse::Status::Complete(head_len)) => {
                let method = Method::parse(parsed.method.unwrap_or(""));
                let target = parsed.path.unwrap_or("").to_string();
                let version = Version::from_minor(parsed.version.unwrap_or(1));
                let headers = header_map_from(parsed.headers)?;
                let wanted = content_length(&headers);

                let mut body = buf.split_off(head_len);
                drop(buf);
                if body.len() < wanted {
                    let mut rest = vec![0u8; wanted - body.len()];
                    stream.read_exact(&mut rest).await?;
                    body.extend_from_slice(&rest);
                } else {
                    body.truncate(wanted);
                }

                return Ok(Some(Request {
                    method,
                    target,
                    version,
                    headers,
                    body: if wanted > 0 { Some(body.to_vec()) } else { None },
                }));
            }
            Ok(httparse::Status::Partial) => {}
            Err(e) => return Err(invalid_data(format!("malformed request: {e}"))),
        }

        let mut chunk = [0u8; READ_CHUNK];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(invalid_data("connection closed mid-request"));
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_HEAD_BYTES {
            return Err(invalid_data("request head too large"));
        }
    }
}

/// Reads one response head and body from an upstream connection.
///
/// Unlike [`read_request`], EOF with an empty buffer is always an error
/// here: a session never calls this unless it just sent a request and
/// expects a reply.
pub async fn read_response<R>(stream: &mut R) -> io::Result<Response>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    loop {
        let mut header_slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Response::new(&mut header_slots);
        match parsed.parse(&buf) {
            Ok(httparse::Status::Complete(head_len)) => {
                let status = parsed.code.ok_or_else(|| invalid_data("missing status code"))?;
                let version = Version::from_minor(parsed.version.unwrap_or(1));
                let headers = header_map_from(parsed.headers)?;
                let wanted = content_length(&headers);

                let mut body = buf.split_off(head_len);
                drop(buf);
                if body.len() < wanted {
                    let mut rest = vec![0u8; wanted - body.len()];
                    stream.read_exact(&mut rest).await?;
                    body.extend_from_slice(&rest);
                } else {
                    body.truncate(wanted);
                }

                return Ok(Response { status, version, headers, body: body.to_vec(), reason: None });
            }
            Ok(httparse::Status::Partial) => {}
            Err(e) => return Err(invalid_data(format!("malformed response: {e}"))),
        }

        let mut chunk = [0u8; READ_CHUNK];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "upstream closed before sending any response",
                ));
            }
            return Err(invalid_data("upstream closed mid-response"));
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_HEAD_BYTES {
            return Err(invalid_data("response head too large"));
        }
    }
}

fn canonical_reason_phrase(status: u16) -> &'static str {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

/// Serializes `req` back onto the wire, for the plain-forward and
/// revalidation paths where the proxy replays (a copy of) the client's
/// request to the origin.
pub async fn write_request<W>(stream: &mut W, req: &Request) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut out = BytesMut::new();
    out.extend_from_slice(
        format!("{} {} HTTP/{}\r\n", req.method, req.target, req.version).as_bytes(),
    );
    write_headers(&mut out, &req.headers);
    out.extend_from_slice(b"\r\n");
    if let Some(body) = &req.body {
        out.extend_from_slice(body);
    }
    stream.write_all(&out).await?;
    stream.flush().await
}

/// Serializes `resp` onto the wire, whether it came from the origin or was
/// synthesized locally (cache hit, `400`, tunnel `200`).
pub async fn write_response<W>(stream: &mut W, resp: &Response) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut out = BytesMut::new();
    out.extend_from_slice(
        format!(
            "HTTP/{} {} {}\r\n",
            resp.version,
            resp.status,
            resp.reason.unwrap_or_else(|| canonical_reason_phrase(resp.status))
        )
        .as_bytes(),
    );
    write_headers(&mut out, &resp.headers);
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(&resp.body);
    stream.write_all(&out).await?;
    stream.flush().await
}

fn write_headers(out: &mut BytesMut, headers: &HeaderMap) {
    for (name, value) in headers.iter() {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_a_simple_get() {
        let raw = b"GET /widgets HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let mut cursor = std::io::Cursor::new(raw.to_vec());
        let req = read_request(&mut cursor).await.unwrap().unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.target, "/widgets");
        assert_eq!(req.host(), Some("example.com"));
        assert!(req.body.is_none());
    }

    #[tokio::test]
    async fn reads_a_post_body_by_content_length() {
        let raw = b"POST /submit HTTP/1.1\r\nHost: example.com\r\nContent-Length: 5\r\n\r\nhello";
        let mut cursor = std::io::Cursor::new(raw.to_vec());
        let req = read_request(&mut cursor).await.unwrap().unwrap();
        assert_eq!(req.body.as_deref(), Some(&b"hello"[..]));
    }

    #[tokio::test]
    async fn clean_eof_before_any_bytes_is_none() {
        let raw: &[u8] = b"";
        let mut cursor = std::io::Cursor::new(raw.to_vec());
        assert!(read_request(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_request_then_eof_is_an_error() {
        let raw = b"GET /widgets HTTP/1.1\r\nHost: exam";
        let mut cursor = std::io::Cursor::new(raw.to_vec());
        assert!(read_request(&mut cursor).await.is_err());
    }

    #[tokio::test]
    async fn round_trips_a_response() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from_static("2"));
        let resp = Response { status: 200, version: Version::Http11, headers, body: b"ok".to_vec(), reason: None };
        let mut out = Vec::new();
        write_response(&mut out, &resp).await.unwrap();
        let mut cursor = std::io::Cursor::new(out);
        let read_back = read_response(&mut cursor).await.unwrap();
        assert_eq!(read_back.status, 200);
        assert_eq!(read_back.body, b"ok");
    }
}
