pub mod config;
pub mod handler;
pub mod http;
pub mod ids;
pub mod observability;
pub mod parser;
pub mod server;
pub mod telemetry;

pub use config::ServerConfig;
pub use parser::{ParseError, RequestParser};
pub use server::{ConnectionDriver, HttpServer, ServerHandle};
