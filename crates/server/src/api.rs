use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use opencontext_mcp::{HttpHandler, HttpRequest};
use serde_json::json;
use std::collections::BTreeMap;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

/// Start the HTTP server and run until Ctrl-C.
pub async fn serve(addr: &str, handler: HttpHandler) -> Result<()> {
    let app = create_router(handler);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("MCP endpoint listening on http://{}/mcp", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// `/health` plus a fallback that hands everything else to the MCP adapter.
pub fn create_router(handler: HttpHandler) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .fallback(forward)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
        .with_state(handler)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

/// Provider health; 503 unless every loaded provider reports healthy.
async fn health_check(State(handler): State<HttpHandler>) -> Response {
    let server = match handler.runtime().server().await {
        Ok(server) => server,
        Err(e) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "unhealthy", "error": e.to_string()})),
            )
                .into_response()
        }
    };

    let providers = server.registry().check_health().await;
    let healthy = !providers.is_empty() && providers.values().all(|ok| *ok);
    let (status, label) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status,
        Json(json!({
            "status": label,
            "version": env!("CARGO_PKG_VERSION"),
            "providers": providers,
        })),
    )
        .into_response()
}

async fn forward(
    State(handler): State<HttpHandler>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let headers: BTreeMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();

    let response = handler
        .handle(HttpRequest {
            method: method.as_str().to_string(),
            path: uri.path().to_string(),
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
            request_id: None,
        })
        .await;

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut out = (status, response.body).into_response();
    for (name, value) in response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                out.headers_mut().insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid response header"),
        }
    }
    out
}
