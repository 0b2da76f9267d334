use std::fmt::Debug;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{Error, Result};

/// A response produced by a [`Transport`](crate::Transport).
///
/// The body can only be consumed once, by [`FetchResponse::text`].
#[async_trait]
pub trait FetchResponse: Debug + Send {
    fn status(&self) -> u16;

    fn status_text(&self) -> &str;

    fn ok(&self) -> bool {
        (200..300).contains(&self.status())
    }

    fn redirected(&self) -> bool;

    fn url(&self) -> &str;

    /// Response headers in the order the source exposes them.
    fn headers(&self) -> Vec<(String, String)>;

    async fn text(self: Box<Self>) -> Result<String>;
}

/// The wire form of a fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedResponse {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub ok: bool,
    pub redirected: bool,
    pub text: String,
    pub headers: Vec<(String, String)>,
}

/// Reads the whole body and captures everything needed to rebuild the response.
pub async fn serialize_response(response: Box<dyn FetchResponse>) -> Result<SerializedResponse> {
    let url = response.url().to_string();
    let status = response.status();
    let status_text = response.status_text().to_string();
    let ok = response.ok();
    let redirected = response.redirected();
    let headers = response.headers();
    let text = response.text().await?;
    Ok(SerializedResponse {
        url,
        status,
        status_text,
        ok,
        redirected,
        text,
        headers,
    })
}

/// A response rebuilt from a [`SerializedResponse`].
///
/// `ok`, `redirected` and `url` are taken from the payload as-is rather than
/// recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFetchResponse {
    serialized: SerializedResponse,
}

impl QueryFetchResponse {
    pub fn new(serialized: SerializedResponse) -> Self {
        Self { serialized }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.serialized
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> &str {
        &self.serialized.text
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.serialized.text).map_err(Error::decode)
    }

    pub fn serialized(&self) -> &SerializedResponse {
        &self.serialized
    }

    pub fn into_serialized(self) -> SerializedResponse {
        self.serialized
    }
}

impl From<SerializedResponse> for QueryFetchResponse {
    fn from(serialized: SerializedResponse) -> Self {
        Self::new(serialized)
    }
}

#[async_trait]
impl FetchResponse for QueryFetchResponse {
    fn status(&self) -> u16 {
        self.serialized.status
    }

    fn status_text(&self) -> &str {
        &self.serialized.status_text
    }

    fn ok(&self) -> bool {
        self.serialized.ok
    }

    fn redirected(&self) -> bool {
        self.serialized.redirected
    }

    fn url(&self) -> &str {
        &self.serialized.url
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.serialized.headers.clone()
    }

    async fn text(self: Box<Self>) -> Result<String> {
        Ok(self.serialized.text)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use super::*;

    fn example() -> SerializedResponse {
        SerializedResponse {
            url: "https://example.com/".to_string(),
            status: 200,
            status_text: "OK".to_string(),
            ok: true,
            redirected: false,
            text: "<!doctype html><title>Example Domain</title>".to_string(),
            headers: vec![
                ("content-type".to_string(), "text/html; charset=UTF-8".to_string()),
                ("x-cache".to_string(), "HIT".to_string()),
            ],
        }
    }

    #[derive(Debug)]
    struct BrokenBody;

    #[async_trait]
    impl FetchResponse for BrokenBody {
        fn status(&self) -> u16 {
            200
        }

        fn status_text(&self) -> &str {
            "OK"
        }

        fn redirected(&self) -> bool {
            false
        }

        fn url(&self) -> &str {
            "https://example.com/"
        }

        fn headers(&self) -> Vec<(String, String)> {
            Vec::new()
        }

        async fn text(self: Box<Self>) -> Result<String> {
            Err(Error::body_read("connection reset"))
        }
    }

    #[test]
    fn uses_camel_case_keys() {
        let value = serde_json::to_value(example()).unwrap();
        let mut keys = value
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        keys.sort();
        assert_eq!(
            keys,
            vec!["headers", "ok", "redirected", "status", "statusText", "text", "url"]
        );
        assert_eq!(value["headers"][0], json!(["content-type", "text/html; charset=UTF-8"]));
    }

    #[tokio::test]
    async fn materialized_response_reproduces_payload() {
        let source = QueryFetchResponse::new(example());
        let serialized = serialize_response(Box::new(source.clone())).await.unwrap();
        assert_eq!(serialized, example());

        let response = QueryFetchResponse::new(serialized);
        assert!(response.ok());
        assert!(!response.redirected());
        assert_eq!(response.url(), "https://example.com/");
        assert_eq!(response.status(), 200);
        assert_eq!(response.header("Content-Type"), Some("text/html; charset=UTF-8"));
        assert_eq!(
            Box::new(response).text().await.unwrap(),
            "<!doctype html><title>Example Domain</title>"
        );
    }

    #[test]
    fn derived_fields_are_not_recomputed() {
        let response = QueryFetchResponse::new(SerializedResponse {
            status: 500,
            ok: true,
            redirected: true,
            ..example()
        });
        assert!(response.ok());
        assert!(response.redirected());
    }

    #[test]
    fn clone_is_an_independent_copy() {
        let response = QueryFetchResponse::new(example());
        let cloned = response.clone();
        assert_eq!(cloned, response);
        let mut serialized = cloned.into_serialized();
        serialized.text.clear();
        assert_eq!(response.body(), example().text);
    }

    #[test]
    fn parses_json_bodies() {
        let response = QueryFetchResponse::new(SerializedResponse {
            text: r#"{"result":"pong"}"#.to_string(),
            ..example()
        });
        let value: Value = response.json().unwrap();
        assert_eq!(value, json!({ "result": "pong" }));
    }

    #[tokio::test]
    async fn body_read_failures_propagate() {
        let result = serialize_response(Box::new(BrokenBody)).await;
        assert_eq!(result, Err(Error::BodyRead("connection reset".to_string())));
    }
}
