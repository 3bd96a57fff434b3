//! Outbound transport for provider backends.

pub mod http;

pub use http::HttpTransport;
