//! Connection lifecycle: the accept loop and the per-connection keep-alive
//! driver. One coroutine per connection; the driver is strictly single-task
//! and shares nothing with its siblings except the metrics sink.

mod connection;
mod http_server;

pub use connection::ConnectionDriver;
pub use http_server::{HttpServer, ServerHandle};
