use anyhow::Result;
use futures::{SinkExt, StreamExt};
use opencontext_mcp::protocol::{JsonRpcError, JsonRpcResponse};
use opencontext_mcp::{McpServer, Reply};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

/// Longest accepted request line, in bytes.
const MAX_LINE_LENGTH: usize = 8 * 1024 * 1024;

/// Serve newline-delimited JSON-RPC on stdin/stdout until stdin closes.
pub async fn run(server: &McpServer) -> Result<()> {
    tracing::info!("MCP server reading from stdin");
    serve_lines(server, tokio::io::stdin(), tokio::io::stdout()).await
}

pub async fn serve_lines<R, W>(server: &McpServer, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let mut out = FramedWrite::new(writer, LinesCodec::new());

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                tracing::warn!("Discarding request line over {} bytes", MAX_LINE_LENGTH);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Value>(&line) {
            Ok(message) => server.handle_value(message).await,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable request line");
                Reply::Response(JsonRpcResponse::error(
                    Value::Null,
                    JsonRpcError::parse_error(e.to_string()),
                ))
            }
        };

        if let Some(response) = reply.into_response() {
            out.send(serde_json::to_string(&response)?).await?;
        }
    }

    tracing::info!("stdin closed, stopping");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use opencontext_core::{
        AppConfig, Arguments, Provider, ProviderCatalog, ProviderCategory, ProviderDescriptor,
        ProviderRegistry, ProviderSource, ToolDescriptor, ToolOutcome,
    };
    use serde_json::json;

    struct NullProvider;

    #[async_trait]
    impl Provider for NullProvider {
        fn descriptor(&self) -> ProviderDescriptor {
            ProviderDescriptor {
                name: "null",
                category: ProviderCategory::CustomApi,
                version: "0.1.0",
            }
        }

        async fn activate(&self) -> anyhow::Result<bool> {
            Ok(true)
        }

        async fn deactivate(&self) -> anyhow::Result<()> {
            Ok(())
        }

        fn list_tools(&self) -> Vec<ToolDescriptor> {
            Vec::new()
        }

        async fn execute_tool(&self, name: &str, _: Arguments) -> anyhow::Result<ToolOutcome> {
            Ok(ToolOutcome::failure(format!("Unknown tool: {}", name)))
        }

        async fn check_health(&self) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    async fn server() -> McpServer {
        let mut catalog = ProviderCatalog::new();
        catalog.register("null", ProviderSource::BuiltIn, |_| {
            Ok(Box::new(NullProvider) as Box<dyn Provider>)
        });
        let config =
            AppConfig::from_value(json!({"plugins": {"null": {"enabled": true}}})).unwrap();
        let mut registry = ProviderRegistry::new(config, catalog);
        registry.load().await.unwrap();
        McpServer::new(registry)
    }

    async fn exchange(input: &str) -> Vec<Value> {
        let server = server().await;
        let mut output = Vec::new();
        serve_lines(&server, input.as_bytes(), &mut output).await.unwrap();

        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_replies_only_to_calls() {
        let replies = exchange(concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
            "\n",
        ))
        .await;

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["id"], 1);
        assert_eq!(replies[0]["result"]["serverInfo"]["name"], "opencontext");
        assert_eq!(replies[1], json!({"jsonrpc": "2.0", "id": 2, "result": {"status": "ok"}}));
    }

    #[tokio::test]
    async fn test_parse_error_then_continue() {
        let replies = exchange("{oops\n{\"id\":3,\"method\":\"ping\"}\n").await;

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["error"]["code"], -32700);
        assert_eq!(replies[0]["id"], Value::Null);
        assert_eq!(replies[1]["result"]["status"], "ok");
    }

    #[tokio::test]
    async fn test_malformed_notification_gets_no_line() {
        let replies = exchange(concat!(
            r#"{"jsonrpc":2.0,"method":"notifications/initialized"}"#,
            "\n",
            r#"{"method":7}"#,
            "\n",
            r#"{"id":4,"method":"ping"}"#,
            "\n",
        ))
        .await;

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["id"], 4);
    }
}
