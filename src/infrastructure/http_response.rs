// HTTP response utilities for JSON with optional Brotli encoding
use async_compression::tokio::bufread::BrotliEncoder;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Response, StatusCode},
};
use serde::Serialize;
use tokio::io::AsyncReadExt;

/// Whether the client advertised Brotli in `Accept-Encoding`
pub fn accepts_brotli(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.contains("br"))
        .unwrap_or(false)
}

/// Serialize `data` to JSON, compressing the body with Brotli when asked
pub async fn json_response<T: Serialize>(
    status: StatusCode,
    data: &T,
    compress: bool,
) -> Result<Response<Body>, StatusCode> {
    let json = serde_json::to_vec(data).map_err(|e| {
        tracing::error!("JSON serialization error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let (body_bytes, content_encoding) = if compress {
        let mut encoder = BrotliEncoder::new(json.as_slice());
        let mut compressed = Vec::new();
        encoder.read_to_end(&mut compressed).await.map_err(|e| {
            tracing::error!("Brotli compression error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        tracing::trace!("Compressed response {} -> {} bytes", json.len(), compressed.len());
        (compressed, Some("br"))
    } else {
        (json, None)
    };

    let mut response_builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, HeaderValue::from(body_bytes.len()));

    if let Some(encoding) = content_encoding {
        response_builder = response_builder.header(header::CONTENT_ENCODING, encoding);
    }

    response_builder.body(Body::from(body_bytes)).map_err(|e| {
        tracing::error!("Response build error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
