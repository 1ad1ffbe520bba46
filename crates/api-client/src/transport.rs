//! HTTP transport seam
//!
//! The client issues every request through the `Transport` trait and gets
//! back a status/body/headers triple. `HttpTransport` is the production
//! implementation over reqwest; tests script responses behind the same
//! seam so race windows are controllable.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::HeaderMap;
use serde_json::Value;

/// One outgoing request, fully assembled by the executor.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// Request payload variants.
///
/// Multipart bodies carry no content-type header from the executor; the
/// transport owns the boundary header.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Vec<FilePart>),
}

/// One part of a multipart upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub name: String,
    pub file_name: String,
    pub mime: String,
    pub data: Vec<u8>,
}

/// Response triple handed back to the executor.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

/// Transport-level failure: no response triple was obtained.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Abstraction over the HTTP round-trip.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: RawRequest,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<RawResponse, TransportError>> + Send + '_>>;
}

/// reqwest-backed transport with a per-request timeout.
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: RawRequest,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<RawResponse, TransportError>> + Send + '_>>
    {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(request.method, &request.url)
                .headers(request.headers)
                .timeout(self.timeout);

            builder = match request.body {
                RequestBody::Empty => builder,
                RequestBody::Json(value) => builder.json(&value),
                RequestBody::Multipart(parts) => {
                    let mut form = reqwest::multipart::Form::new();
                    for part in parts {
                        let piece = reqwest::multipart::Part::bytes(part.data)
                            .file_name(part.file_name)
                            .mime_str(&part.mime)
                            .map_err(|e| {
                                TransportError::new(format!("invalid mime type: {e}"))
                            })?;
                        form = form.part(part.name, piece);
                    }
                    builder.multipart(form)
                }
            };

            let response = builder
                .send()
                .await
                .map_err(|e| TransportError::new(e.to_string()))?;

            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let body = response
                .text()
                .await
                .map_err(|e| TransportError::new(format!("reading response body: {e}")))?;

            Ok(RawResponse {
                status,
                headers,
                body,
            })
        })
    }
}
