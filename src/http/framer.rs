//! Request framing over a buffered byte stream.
//!
//! # Responsibilities
//! - Read the request line and header block, line by line
//! - Validate method/target/version and header syntax
//! - Read (or discard) exactly `Content-Length` body bytes on request
//! - Number requests with the connection's `RequestId` sequence
//!
//! # Design Decisions
//! - No mid-stream recovery: after a structural error byte alignment is
//!   lost, so the caller answers 400 and closes
//! - The request line and headers share one size budget
//! - Clean end-of-stream between messages is not an error

use std::io;

use bytes::Bytes;
use http::StatusCode;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::http::{Headers, Method, Request, RequestId, Version};

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("malformed request line")]
    MalformedRequestLine,

    #[error("malformed header line")]
    MalformedHeader,

    #[error("request head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },

    #[error("connection closed in the middle of a request")]
    UnexpectedEof,

    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

impl FramingError {
    /// Status of the terminal response owed to the client, if any. Transport
    /// failures get no response; the connection just goes away.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FramingError::MalformedRequestLine | FramingError::MalformedHeader => {
                Some(StatusCode::BAD_REQUEST)
            }
            FramingError::HeadTooLarge { .. } => Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE),
            FramingError::UnexpectedEof | FramingError::Io(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FramingError::MalformedRequestLine => "malformed_request_line",
            FramingError::MalformedHeader => "malformed_header",
            FramingError::HeadTooLarge { .. } => "head_too_large",
            FramingError::UnexpectedEof => "unexpected_eof",
            FramingError::Io(_) => "io",
        }
    }
}

/// Per-connection request framer.
pub struct Framer<R> {
    reader: R,
    next_id: RequestId,
    max_head_len: usize,
    line: Vec<u8>,
}

impl<R> Framer<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R, max_head_len: usize) -> Self {
        Self::starting_at(reader, max_head_len, RequestId::ZERO)
    }

    pub fn starting_at(reader: R, max_head_len: usize, first: RequestId) -> Self {
        Self {
            reader,
            next_id: first,
            max_head_len,
            line: Vec::with_capacity(256),
        }
    }

    /// Id the next framed request will get. After a framing error this is
    /// the id of the request that failed.
    pub fn next_id(&self) -> RequestId {
        self.next_id
    }

    /// Frame the next request head. `Ok(None)` on clean end of stream.
    ///
    /// The returned request never carries a body; read it with
    /// [`Framer::read_body`] once the dispatcher has admitted it.
    pub async fn next_request(&mut self) -> Result<Option<Request>, FramingError> {
        let mut budget = self.max_head_len;

        // Empty lines ahead of a request line are tolerated.
        loop {
            if !self.read_line(&mut budget, true).await? {
                return Ok(None);
            }
            if !self.line.is_empty() {
                break;
            }
        }
        let (method, target, version) = parse_request_line(&self.line)?;

        let mut headers = Headers::new();
        loop {
            if !self.read_line(&mut budget, false).await? {
                return Err(FramingError::UnexpectedEof);
            }
            if self.line.is_empty() {
                break;
            }
            parse_header_line(&self.line, &mut headers)?;
        }

        let request = Request::new(self.next_id, method, target, version, headers);
        self.next_id = self.next_id.next();
        Ok(Some(request))
    }

    /// Read one line into `self.line`, terminator stripped. Returns `false`
    /// when the stream ended before any byte of the line (only allowed when
    /// `eof_ok`).
    async fn read_line(&mut self, budget: &mut usize, eof_ok: bool) -> Result<bool, FramingError> {
        self.line.clear();
        let limit = *budget as u64;
        let n = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.line)
            .await?;
        *budget -= n;

        if n == 0 {
            if *budget == 0 {
                return Err(FramingError::HeadTooLarge {
                    limit: self.max_head_len,
                });
            }
            return if eof_ok {
                Ok(false)
            } else {
                Err(FramingError::UnexpectedEof)
            };
        }

        if self.line.last() != Some(&b'\n') {
            if *budget == 0 {
                return Err(FramingError::HeadTooLarge {
                    limit: self.max_head_len,
                });
            }
            return Err(FramingError::UnexpectedEof);
        }

        self.line.pop();
        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }
        Ok(true)
    }

    /// Read exactly `len` body bytes.
    pub async fn read_body(&mut self, len: u64) -> io::Result<Bytes> {
        let len = usize::try_from(len).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "body length exceeds address space")
        })?;
        let mut body = vec![0u8; len];
        self.reader.read_exact(&mut body).await?;
        Ok(Bytes::from(body))
    }

    /// Consume and drop exactly `len` body bytes, keeping the stream aligned
    /// on the next request.
    pub async fn discard_body(&mut self, len: u64) -> io::Result<()> {
        let copied = tokio::io::copy(&mut (&mut self.reader).take(len), &mut tokio::io::sink()).await?;
        if copied != len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed while discarding request body",
            ));
        }
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

fn parse_request_line(line: &[u8]) -> Result<(Method, String, Version), FramingError> {
    let line = std::str::from_utf8(line).map_err(|_| FramingError::MalformedRequestLine)?;
    let parts: Vec<&str> = line.split(' ').collect();
    let [method, target, version] = parts.as_slice() else {
        return Err(FramingError::MalformedRequestLine);
    };

    let method: Method = method
        .parse()
        .map_err(|_| FramingError::MalformedRequestLine)?;
    if target.is_empty() {
        return Err(FramingError::MalformedRequestLine);
    }
    let version: Version = version
        .parse()
        .map_err(|_| FramingError::MalformedRequestLine)?;

    Ok((method, target.to_string(), version))
}

fn parse_header_line(line: &[u8], headers: &mut Headers) -> Result<(), FramingError> {
    let colon = memchr::memchr(b':', line).ok_or(FramingError::MalformedHeader)?;
    let name = std::str::from_utf8(&line[..colon]).map_err(|_| FramingError::MalformedHeader)?;
    if name.is_empty() || name.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
        return Err(FramingError::MalformedHeader);
    }
    let value =
        std::str::from_utf8(&line[colon + 1..]).map_err(|_| FramingError::MalformedHeader)?;

    headers.extend(
        name,
        value
            .split(',')
            .map(|v| v.strip_prefix(' ').unwrap_or(v)),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::BufReader;

    fn framer(input: &'static [u8]) -> Framer<BufReader<&'static [u8]>> {
        Framer::new(BufReader::new(input), 8 * 1024)
    }

    #[tokio::test]
    async fn frames_request_line_headers_and_body() {
        let mut f = framer(
            b"POST /submit?x=1 HTTP/1.1\r\nHost: example.com\r\nContent-Length: 5\r\nAccept: text/html, application/json\r\n\r\nhello",
        );
        let req = f.next_request().await.unwrap().unwrap();
        assert_eq!(req.id(), RequestId::ZERO);
        assert_eq!(req.method(), Method::Post);
        assert_eq!(req.target(), "/submit?x=1");
        assert_eq!(req.version(), Version::Http11);
        assert_eq!(req.header("host"), Some("example.com"));
        assert_eq!(
            req.headers().get("accept").unwrap(),
            &["text/html".to_string(), "application/json".to_string()]
        );
        assert_eq!(req.headers().content_length(), Ok(Some(5)));
        assert!(req.body().is_none());

        let body = f.read_body(5).await.unwrap();
        assert_eq!(&body[..], b"hello");
        assert!(f.next_request().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn numbers_pipelined_requests() {
        let mut f = framer(b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n");
        let a = f.next_request().await.unwrap().unwrap();
        let b = f.next_request().await.unwrap().unwrap();
        assert_eq!((a.id().as_u64(), a.target()), (0, "/a"));
        assert_eq!((b.id().as_u64(), b.target()), (1, "/b"));
        assert_eq!(f.next_id().as_u64(), 2);
        assert!(f.next_request().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ids_wrap_at_ceiling() {
        let input: &'static [u8] = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
        let mut f = Framer::starting_at(BufReader::new(input), 1024, RequestId::new(u64::MAX));
        let a = f.next_request().await.unwrap().unwrap();
        let b = f.next_request().await.unwrap().unwrap();
        assert_eq!(a.id(), RequestId::new(u64::MAX));
        assert_eq!(b.id(), RequestId::ZERO);
    }

    #[tokio::test]
    async fn header_names_lowercased_and_values_split() {
        let mut f = framer(b"GET / HTTP/1.1\r\nX-Custom-Thing: a,b, c\r\nEmpty:\r\n\r\n");
        let req = f.next_request().await.unwrap().unwrap();
        assert_eq!(req.headers().names().collect::<Vec<_>>(), vec!["x-custom-thing", "empty"]);
        assert_eq!(
            req.headers().get("x-custom-thing").unwrap(),
            &["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert_eq!(req.headers().first("empty"), Some(""));
    }

    #[tokio::test]
    async fn only_one_leading_space_is_stripped() {
        let mut f = framer(b"GET / HTTP/1.1\r\nx-pad:  two\r\n\r\n");
        let req = f.next_request().await.unwrap().unwrap();
        assert_eq!(req.header("x-pad"), Some(" two"));
    }

    #[tokio::test]
    async fn wrong_token_count_is_malformed() {
        for input in [
            &b"GET /\r\n\r\n"[..],
            &b"GET / HTTP/1.1 extra\r\n\r\n"[..],
            &b"GET  / HTTP/1.1\r\n\r\n"[..],
        ] {
            let mut f = Framer::new(BufReader::new(input), 1024);
            let err = f.next_request().await.unwrap_err();
            assert!(matches!(err, FramingError::MalformedRequestLine), "{input:?}");
            assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
            assert_eq!(f.next_id(), RequestId::ZERO);
        }
    }

    #[tokio::test]
    async fn unknown_method_or_version_is_malformed() {
        let mut f = framer(b"BREW /pot HTTP/1.1\r\n\r\n");
        assert!(matches!(
            f.next_request().await,
            Err(FramingError::MalformedRequestLine)
        ));

        let mut f = framer(b"GET / HTTP/2.0\r\n\r\n");
        assert!(matches!(
            f.next_request().await,
            Err(FramingError::MalformedRequestLine)
        ));
    }

    #[tokio::test]
    async fn header_without_colon_is_malformed() {
        let mut f = framer(b"GET / HTTP/1.1\r\nHost example.com\r\n\r\n");
        let err = f.next_request().await.unwrap_err();
        assert!(matches!(err, FramingError::MalformedHeader));
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn tolerates_leading_empty_lines_and_bare_lf() {
        let mut f = framer(b"\r\n\r\nGET / HTTP/1.1\nHost: x\n\n");
        let req = f.next_request().await.unwrap().unwrap();
        assert_eq!(req.header("host"), Some("x"));
    }

    #[tokio::test]
    async fn clean_eof_ends_sequence() {
        let mut f = framer(b"");
        assert!(f.next_request().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_mid_head_is_an_error() {
        let mut f = framer(b"GET / HTTP/1.1\r\nHost: x\r\n");
        let err = f.next_request().await.unwrap_err();
        assert!(matches!(err, FramingError::UnexpectedEof));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn oversized_head_is_rejected() {
        let input: &'static [u8] = b"GET / HTTP/1.1\r\nX-Long: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\r\n\r\n";
        let mut f = Framer::new(BufReader::new(input), 32);
        let err = f.next_request().await.unwrap_err();
        assert!(matches!(err, FramingError::HeadTooLarge { limit: 32 }));
        assert_eq!(err.status(), Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE));
    }

    #[tokio::test]
    async fn discard_keeps_alignment() {
        let mut f = framer(
            b"POST /a HTTP/1.1\r\nContent-Length: 4\r\n\r\njunkGET /b HTTP/1.1\r\n\r\n",
        );
        let first = f.next_request().await.unwrap().unwrap();
        assert_eq!(first.target(), "/a");
        f.discard_body(4).await.unwrap();
        let second = f.next_request().await.unwrap().unwrap();
        assert_eq!(second.target(), "/b");
    }

    #[tokio::test]
    async fn short_body_is_an_error() {
        let mut f = framer(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc");
        f.next_request().await.unwrap().unwrap();
        let err = f.read_body(10).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
