use std::collections::{BTreeMap, HashMap};

use http::HeaderMap;

/// The header representations accepted on an outbound request.
///
/// Whatever the caller hands in, [`HeadersInit::normalize`] produces the one
/// canonical form used on the wire: ordered `(name, value)` pairs with
/// lower-cased, trimmed names.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum HeadersInit {
    #[default]
    Empty,
    Pairs(Vec<(String, String)>),
    Map(BTreeMap<String, String>),
    HeaderMap(HeaderMap),
}

impl HeadersInit {
    pub fn normalize(&self) -> Vec<(String, String)> {
        match self {
            Self::Empty => Vec::new(),
            Self::Pairs(pairs) => pairs
                .iter()
                .map(|(name, value)| (normalize_name(name), value.clone()))
                .collect(),
            Self::Map(map) => map
                .iter()
                .map(|(name, value)| (normalize_name(name), value.clone()))
                .collect(),
            Self::HeaderMap(headers) => headers
                .iter()
                .map(|(name, value)| {
                    (
                        normalize_name(name.as_str()),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Pairs(pairs) => pairs.is_empty(),
            Self::Map(map) => map.is_empty(),
            Self::HeaderMap(headers) => headers.is_empty(),
        }
    }

    /// Appends a header, converting the current representation to pairs.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let mut pairs = match std::mem::take(self) {
            Self::Pairs(pairs) => pairs,
            other => other.normalize(),
        };
        pairs.push((name.into(), value.into()));
        *self = Self::Pairs(pairs);
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for HeadersInit {
    fn from(pairs: Vec<(K, V)>) -> Self {
        Self::Pairs(
            pairs
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for HeadersInit {
    fn from(pairs: [(K, V); N]) -> Self {
        Self::from(Vec::from(pairs))
    }
}

impl From<BTreeMap<String, String>> for HeadersInit {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self::Map(map)
    }
}

impl From<HashMap<String, String>> for HeadersInit {
    fn from(map: HashMap<String, String>) -> Self {
        Self::Map(map.into_iter().collect())
    }
}

impl From<HeaderMap> for HeadersInit {
    fn from(headers: HeaderMap) -> Self {
        Self::HeaderMap(headers)
    }
}

#[cfg(test)]
mod tests {
    use http::{header, HeaderValue};
    use pretty_assertions::assert_eq;

    use super::*;

    fn expected() -> Vec<(String, String)> {
        vec![("content-type".to_string(), "application/json".to_string())]
    }

    #[test]
    fn normalizes_pairs() {
        let headers = HeadersInit::from(vec![(" Content-Type ", "application/json")]);
        assert_eq!(headers.normalize(), expected());
    }

    #[test]
    fn normalizes_maps() {
        let headers = HeadersInit::from(HashMap::from([(
            "cOnTent-Type".to_string(),
            "application/json".to_string(),
        )]));
        assert_eq!(headers.normalize(), expected());
    }

    #[test]
    fn normalizes_header_maps() {
        let mut map = HeaderMap::new();
        map.append(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert_eq!(HeadersInit::from(map).normalize(), expected());
    }

    #[test]
    fn preserves_pair_order() {
        let headers = HeadersInit::from([("X-B", "2"), ("X-A", "1"), ("X-B", "3")]);
        assert_eq!(
            headers.normalize(),
            vec![
                ("x-b".to_string(), "2".to_string()),
                ("x-a".to_string(), "1".to_string()),
                ("x-b".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn append_converts_to_pairs() {
        let mut headers = HeadersInit::default();
        assert!(headers.is_empty());
        headers.append("Accept", "text/html");
        assert_eq!(
            headers,
            HeadersInit::Pairs(vec![("Accept".to_string(), "text/html".to_string())])
        );
    }
}
