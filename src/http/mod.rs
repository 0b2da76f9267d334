pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use headers::{HeaderMapExt, ReadHeaders, WriteHeaders};
pub use request::{ReadRequest, Request};
pub use response::{Response, WriteResponse};
