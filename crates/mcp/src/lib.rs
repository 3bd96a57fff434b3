// MCP (Model Context Protocol) server: JSON-RPC dispatch over the provider registry

pub mod http;
pub mod protocol;
pub mod redact;
pub mod runtime;
pub mod server;

pub use http::{HttpHandler, HttpRequest, HttpResponse};
pub use runtime::ServerRuntime;
pub use server::{McpServer, Reply};
