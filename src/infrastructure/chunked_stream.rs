// Chunked JSON streaming utilities
use crate::application::notification::Notice;
use async_compression::tokio::bufread::BrotliEncoder;
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Create a chunked streaming response of length-prefixed JSON frames
pub fn chunked_json_stream<S, T>(stream: S, compress: bool) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + Sync + 'static,
{
    let byte_stream = stream.then(move |msg| async move { serialize_chunk(&msg, compress).await });

    let body = Body::from_stream(byte_stream);

    // Frames are compressed individually, so no Content-Encoding on the response
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson-framed")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// One frame: u32 big-endian payload length, then the JSON payload (optionally brotli)
pub async fn serialize_chunk<T: Serialize>(msg: &T, compress: bool) -> Result<Bytes, std::io::Error> {
    let buffer = serde_json::to_vec(msg)?;

    let payload = if compress {
        let mut encoder = BrotliEncoder::new(buffer.as_slice());
        let mut compressed = Vec::new();
        encoder.read_to_end(&mut compressed).await?;
        compressed
    } else {
        buffer
    };

    let mut chunk = BytesMut::with_capacity(4 + payload.len());
    chunk.put_u32(payload.len() as u32);
    chunk.put_slice(&payload);

    Ok(chunk.freeze())
}

fn notices(mut rx: broadcast::Receiver<Notice>) -> impl Stream<Item = Notice> + Send + 'static {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(notice) => yield notice,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Notice stream lagged, skipped {} notices", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

/// Stream every notice published after subscription until the client disconnects
pub fn stream_from_broadcast(rx: broadcast::Receiver<Notice>, compress: bool) -> impl IntoResponse {
    match chunked_json_stream(notices(rx), compress) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
