use async_trait::async_trait;
use http::{HeaderMap, Method};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::{HeaderMapExt, ReadHeaders};
use crate::io::error::{error, Body, RequestStatusLine};

/// Largest request body the proxy accepts.
pub const MAX_BODY_LENGTH: usize = 64 * 1024 * 1024;

#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub version: String,
    pub body: String,
    headers: HeaderMap,
}

impl Request {
    /// The path without its query string.
    pub fn route(&self) -> &str {
        self.path
            .split_once('?')
            .map_or(self.path.as_str(), |(route, _)| route)
    }
}

impl HeaderMapExt for Request {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }
}

#[async_trait]
pub trait ReadRequest {
    async fn read_request(&mut self) -> io::Result<Request>;
}

#[async_trait]
impl<R> ReadRequest for R
where
    R: AsyncBufRead + ?Sized + Unpin + Send,
{
    async fn read_request(&mut self) -> io::Result<Request> {
        let mut status_line = String::new();
        if self.read_line(&mut status_line).await? == 0 {
            return Err(error(RequestStatusLine::MissingStatusLine));
        }
        let (method, path, version) = {
            let mut parts = status_line.split_whitespace();
            (
                parts
                    .next()
                    .ok_or_else(|| error(RequestStatusLine::MissingMethod))?
                    .parse()
                    .map_err(|_| error(RequestStatusLine::InvalidMethod))?,
                parts
                    .next()
                    .ok_or_else(|| error(RequestStatusLine::MissingPath))?
                    .to_string(),
                parts
                    .next()
                    .ok_or_else(|| error(RequestStatusLine::MissingVersion))?
                    .to_string(),
            )
        };
        let mut request = Request {
            method,
            path,
            version,
            body: String::new(),
            headers: self.read_headers().await?,
        };
        let length = request.get_content_length()?.unwrap_or(0);
        if length > MAX_BODY_LENGTH {
            return Err(error(Body::TooLarge(length)));
        }
        let mut body = vec![0; length];
        self.read_exact(&mut body).await?;
        request.body = String::from_utf8(body).map_err(|_| error(Body::InvalidUtf8))?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use http::header;
    use pretty_assertions::assert_eq;
    use tokio::io::BufReader;

    use super::*;

    #[tokio::test]
    async fn reads_request_with_body() {
        let raw = b"POST /?debug=1 HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 7\r\n\r\n{\"a\":1}";
        let mut reader = BufReader::new(&raw[..]);
        let request = reader.read_request().await.unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.route(), "/");
        assert_eq!(request.version, "HTTP/1.1");
        assert_eq!(
            request.header(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(request.body, "{\"a\":1}");
    }

    #[tokio::test]
    async fn reads_request_without_body() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let mut reader = BufReader::new(&raw[..]);
        let request = reader.read_request().await.unwrap();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.body, "");
    }

    #[tokio::test]
    async fn rejects_truncated_headers() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n";
        let mut reader = BufReader::new(&raw[..]);
        assert!(reader.read_request().await.is_err());
    }

    #[tokio::test]
    async fn rejects_missing_version() {
        let raw = b"GET /\r\n\r\n";
        let mut reader = BufReader::new(&raw[..]);
        assert!(reader.read_request().await.is_err());
    }
}
