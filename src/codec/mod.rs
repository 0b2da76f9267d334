pub mod headers;
pub mod request;
pub mod response;

pub use headers::HeadersInit;
pub use request::{serialize_request, Body, Redirect, RequestOptions, SerializedRequest};
pub use response::{serialize_response, FetchResponse, QueryFetchResponse, SerializedResponse};
