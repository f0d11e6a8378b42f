//! Responses and their wire encoding.
//!
//! # Responsibilities
//! - Carry status, headers and payload for one request
//! - Serialize the status line and header block
//! - Write the payload as raw bytes, UTF-8 text, or streamed from a file
//!
//! # Design Decisions
//! - `Content-Length` is always emitted (computed from the payload) unless
//!   the handler set one itself; there is no chunked coding
//! - Header names go out lowercased, multiple values joined with `", "`

use std::io;
use std::path::PathBuf;

use bytes::Bytes;
use http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::{Headers, Request, RequestId, Version};

/// Response payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Content {
    #[default]
    Empty,
    Bytes(Bytes),
    Text(String),
    /// Streamed from disk when the response is written.
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Response {
    id: RequestId,
    version: Version,
    status: StatusCode,
    headers: Headers,
    content: Content,
    omit_body: bool,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            id: RequestId::ZERO,
            version: Version::Http11,
            status,
            headers: Headers::new(),
            content: Content::Empty,
            omit_body: false,
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// A response answering `request`: same id, same protocol version.
    pub fn for_request(request: &Request, status: StatusCode) -> Self {
        Self::new(status)
            .with_id(request.id())
            .with_version(request.version())
    }

    pub fn with_id(mut self, id: RequestId) -> Self {
        self.id = id;
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_bytes(self, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.with_content(content_type, Content::Bytes(body.into()))
    }

    pub fn with_text(self, content_type: &str, text: impl Into<String>) -> Self {
        self.with_content(content_type, Content::Text(text.into()))
    }

    pub fn with_file(self, content_type: &str, path: impl Into<PathBuf>) -> Self {
        self.with_content(content_type, Content::File(path.into()))
    }

    fn with_content(mut self, content_type: &str, content: Content) -> Self {
        self.headers.insert("content-type", content_type);
        self.content = content;
        self
    }

    /// Write the head only (HEAD requests). `Content-Length` still reflects
    /// the payload.
    pub(crate) fn without_body(mut self) -> Self {
        self.omit_body = true;
        self
    }

    pub(crate) fn set_id(&mut self, id: RequestId) {
        self.id = id;
    }

    pub(crate) fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Whether the connection is shut down once this response is written.
    pub fn closes_connection(&self) -> bool {
        self.headers.has_token("connection", "close")
    }

    fn emits_length(&self) -> bool {
        !(self.status.is_informational() || self.status == StatusCode::NO_CONTENT)
    }

    /// Status line and header block, terminated by the empty line.
    pub fn encode_head(&self, content_length: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        out.extend_from_slice(self.version.as_str().as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.status.as_str().as_bytes());
        out.push(b' ');
        out.extend_from_slice(
            self.status
                .canonical_reason()
                .unwrap_or("Unknown")
                .as_bytes(),
        );
        out.extend_from_slice(b"\r\n");

        for (name, values) in self.headers.iter() {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(values.join(", ").as_bytes());
            out.extend_from_slice(b"\r\n");
        }

        if self.emits_length() && !self.headers.contains("content-length") {
            out.extend_from_slice(format!("content-length: {content_length}\r\n").as_bytes());
        }

        out.extend_from_slice(b"\r\n");
        out
    }

    /// Write the full response (head, then payload) and flush.
    pub async fn write_to<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        match &self.content {
            Content::Empty => {
                writer.write_all(&self.encode_head(0)).await?;
            }
            Content::Bytes(body) => self.write_buffered(writer, body).await?,
            Content::Text(text) => self.write_buffered(writer, text.as_bytes()).await?,
            Content::File(path) => {
                let mut file = tokio::fs::File::open(path).await?;
                let len = file.metadata().await?.len();
                writer.write_all(&self.encode_head(len)).await?;
                if !self.omit_body {
                    let copied = tokio::io::copy(&mut (&mut file).take(len), writer).await?;
                    if copied != len {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("{} shrank while streaming", path.display()),
                        ));
                    }
                }
            }
        }
        writer.flush().await
    }

    async fn write_buffered<W>(&self, writer: &mut W, body: &[u8]) -> io::Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        writer.write_all(&self.encode_head(body.len() as u64)).await?;
        if !self.omit_body {
            writer.write_all(body).await?;
        }
        Ok(())
    }
}
