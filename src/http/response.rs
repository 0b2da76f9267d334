use async_trait::async_trait;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};

use super::{HeaderMapExt, WriteHeaders};

#[derive(Debug)]
pub struct Response {
    pub version: String,
    pub status: StatusCode,
    headers: HeaderMap,
    body: Option<String>,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            version: "HTTP/1.1".to_string(),
            status,
            headers: vec![(header::CONTENT_LENGTH, HeaderValue::from_static("0"))]
                .into_iter()
                .collect(),
            body: None,
        }
    }

    pub fn error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// A response whose body is `value` encoded as JSON.
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => {
                let mut response = Self::new(status);
                response.insert_header(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                response.set_body(body);
                response
            }
            Err(_) => Self::error(),
        }
    }

    pub fn set_body(&mut self, body: String) {
        self.insert_header(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        self.body = Some(body);
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

impl HeaderMapExt for Response {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }
}

#[async_trait]
pub trait WriteResponse {
    async fn write_response(&mut self, response: &Response) -> io::Result<()>;
}

#[async_trait]
impl<R> WriteResponse for R
where
    R: AsyncWrite + ?Sized + Unpin + Send,
{
    async fn write_response(&mut self, response: &Response) -> io::Result<()> {
        self.write_all(response.version.as_bytes()).await?;
        self.write_all(b" ").await?;
        self.write_all(response.status.as_str().as_bytes()).await?;
        self.write_all(b" ").await?;
        if let Some(reason) = response.status.canonical_reason() {
            self.write_all(reason.as_bytes()).await?;
        }
        self.write_all(b"\r\n").await?;
        self.write_headers(&response.headers).await?;
        self.write_all(b"\r\n").await?;
        if let Some(body) = &response.body {
            self.write_all(body.as_bytes()).await?;
        }
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn writes_json_response() {
        let response = Response::json(StatusCode::OK, &json!({ "result": "pong" }));
        let mut buffer = Vec::new();
        buffer.write_response(&response).await.unwrap();
        let written = String::from_utf8(buffer).unwrap();
        assert!(written.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(written.contains("content-length: 17\r\n"));
        assert!(written.contains("content-type: application/json\r\n"));
        assert!(written.ends_with("\r\n\r\n{\"result\":\"pong\"}"));
    }

    #[tokio::test]
    async fn writes_empty_response() {
        let mut buffer = Vec::new();
        buffer
            .write_response(&Response::new(StatusCode::NOT_FOUND))
            .await
            .unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n"
        );
    }
}
