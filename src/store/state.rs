use std::sync::Arc;

use crate::{codec::SerializedResponse, Error};

/// State of a cache key. A key with no record is in its initial state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Inflight,
    Resolved(Arc<SerializedResponse>),
}

impl RequestState {
    pub fn is_inflight(&self) -> bool {
        matches!(self, Self::Inflight)
    }

    pub fn resolved(&self) -> Option<&Arc<SerializedResponse>> {
        match self {
            Self::Resolved(response) => Some(response),
            Self::Inflight => None,
        }
    }
}

/// How an in-flight key finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Resolved(Arc<SerializedResponse>),
    Failed(Error),
}

#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub key: String,
    /// Token of the in-flight record that settled.
    pub owner: u64,
    pub outcome: Outcome,
}
