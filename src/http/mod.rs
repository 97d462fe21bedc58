//! Wire-level HTTP value types: methods, versions, statuses, headers, and
//! the request/response pair exchanged between the parser, the handlers and
//! the connection loop.

mod headers;
mod method;
mod request;
mod response;
mod status;
mod version;

pub use headers::HeaderMap;
pub use method::Method;
pub use request::Request;
pub use response::{BodySupplier, ConnectionDirective, Response};
pub use status::Status;
pub use version::Version;
