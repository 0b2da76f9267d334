use std::fmt::Display;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the fetch engine.
///
/// The type is `Clone` so a single failed real call can be handed to every
/// caller that was coalesced onto it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The request body is not text and cannot cross the proxy link.
    UnrepresentableBody,
    /// The proxy could not be reached.
    ProxyUnreachable(String),
    /// The proxy answered with a non-2xx status.
    ProxyResponse { status: u16, body: String },
    /// A response body could not be read in full.
    BodyRead(String),
    /// The underlying transport failed to perform the request.
    Transport(String),
    /// A payload could not be decoded.
    Decode(String),
    /// The call performing the real request for `key` was dropped before finishing.
    Cancelled { key: String },
    /// The real call this caller was waiting on failed.
    Coalesced { key: String, source: Box<Error> },
}

impl Error {
    pub fn transport<E: Display>(error: E) -> Self {
        Self::Transport(error.to_string())
    }

    pub fn decode<E: Display>(error: E) -> Self {
        Self::Decode(error.to_string())
    }

    pub fn body_read<E: Display>(error: E) -> Self {
        Self::BodyRead(error.to_string())
    }

    pub fn coalesced(key: impl Into<String>, source: Error) -> Self {
        Self::Coalesced {
            key: key.into(),
            source: Box::new(source),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnrepresentableBody => "Request body is not representable as text".fmt(f),
            Self::ProxyUnreachable(message) => write!(f, "Proxy is unreachable: {message}"),
            Self::ProxyResponse { status, body } => {
                write!(f, "Non-OK response from local proxy ({status}): {body}")
            }
            Self::BodyRead(message) => write!(f, "Failed to read response body: {message}"),
            Self::Transport(message) => write!(f, "Request failed: {message}"),
            Self::Decode(message) => write!(f, "Failed to decode payload: {message}"),
            Self::Cancelled { key } => write!(f, "Request for {key} was cancelled"),
            Self::Coalesced { key, source } => {
                write!(f, "Coalesced request for {key} failed: {source}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Coalesced { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn coalesced_error_keeps_source() {
        let error = Error::coalesced("https://example.com", Error::transport("boom"));
        assert_eq!(
            error.to_string(),
            "Coalesced request for https://example.com failed: Request failed: boom"
        );
        assert!(std::error::Error::source(&error).is_some());
    }
}
