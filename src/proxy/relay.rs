//! Response relay: turns a read outcome into the client response
//!
//! Bodies are forwarded chunk by chunk as the store yields them. Once the
//! status line is sent a failing body can only truncate the response, so
//! mid-stream errors are logged and passed to hyper, which aborts the
//! connection instead of completing the message.

use crate::proxy::headers::*;
use crate::proxy::types::ObjectKey;
use crate::store::{ObjectBody, ObjectReadResult, ReadOutcome};
use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use futures_core::Stream;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, warn};

pin_project! {
    /// Object body that tracks how much of it reached the client
    pub struct RelayStream {
        #[pin]
        inner: ObjectBody,
        key: ObjectKey,
        sent: u64,
        expected: Option<u64>,
    }
}

impl RelayStream {
    pub fn new(inner: ObjectBody, key: ObjectKey, expected: Option<u64>) -> Self {
        Self {
            inner,
            key,
            sent: 0,
            expected,
        }
    }
}

impl Stream for RelayStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                *this.sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                warn!(
                    key = %this.key,
                    bytes_sent = *this.sent,
                    expected = ?this.expected,
                    error = %e,
                    "Object body failed mid-stream; truncating response"
                );
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                debug!(key = %this.key, bytes_sent = *this.sent, "Object body relayed");
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Build the client response for a read outcome
pub fn relay(key: &ObjectKey, outcome: ReadOutcome) -> Response {
    match outcome {
        ReadOutcome::Object(object) => relay_object(key, object),
        ReadOutcome::NotModified { etag } => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::NOT_MODIFIED;
            if let Some(etag) = etag {
                insert_header(response.headers_mut(), key, ETAG, etag.as_ref());
            }
            response
        }
    }
}

fn relay_object(key: &ObjectKey, object: ObjectReadResult) -> Response {
    let ObjectReadResult {
        content_length,
        content_range,
        etag,
        content_type,
        last_modified,
        cache_control,
        body,
    } = object;

    let stream = RelayStream::new(body, key.clone(), content_length);
    let mut response = Response::new(Body::from_stream(stream));
    let headers = response.headers_mut();

    if let Some(length) = content_length {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    }
    if let Some(range) = content_range {
        insert_header(headers, key, CONTENT_RANGE, &range.to_string());
    }
    if let Some(etag) = &etag {
        insert_header(headers, key, ETAG, etag.as_ref());
    }
    let content_type = content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
    if !insert_header(headers, key, CONTENT_TYPE, content_type) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    }
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static(ACCEPT_RANGES_BYTES));
    if let Some(last_modified) = &last_modified {
        insert_header(headers, key, LAST_MODIFIED, last_modified);
    }
    if let Some(cache_control) = &cache_control {
        insert_header(headers, key, CACHE_CONTROL, cache_control);
    }

    *response.status_mut() = if content_range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    response
}

/// Insert a header taken from object metadata, skipping values HTTP cannot carry
fn insert_header(
    headers: &mut HeaderMap,
    key: &ObjectKey,
    name: HeaderName,
    value: &str,
) -> bool {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
            true
        }
        Err(_) => {
            warn!(
                key = %key,
                header = %name,
                "Skipping object metadata that is not a valid header value"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::range::ContentRange;
    use crate::proxy::types::ETag;
    use futures_util::stream;
    use http_body_util::BodyExt;

    fn key() -> ObjectKey {
        ObjectKey::try_new("a.txt").unwrap()
    }

    fn object(chunks: Vec<std::io::Result<Bytes>>) -> ObjectReadResult {
        ObjectReadResult {
            content_length: Some(5),
            content_range: None,
            etag: Some(ETag::try_new("\"v1\"").unwrap()),
            content_type: Some("text/plain".to_string()),
            last_modified: Some("Wed, 21 Oct 2015 07:28:00 GMT".to_string()),
            cache_control: None,
            body: Box::pin(stream::iter(chunks)),
        }
    }

    #[tokio::test]
    async fn test_full_object_response() {
        let outcome = ReadOutcome::Object(object(vec![
            Ok(Bytes::from_static(b"hel")),
            Ok(Bytes::from_static(b"lo")),
        ]));
        let response = relay(&key(), outcome);

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[CONTENT_LENGTH], "5");
        assert_eq!(headers[ETAG], "\"v1\"");
        assert_eq!(headers[CONTENT_TYPE], "text/plain");
        assert_eq!(headers[ACCEPT_RANGES], "bytes");
        assert_eq!(headers[LAST_MODIFIED], "Wed, 21 Oct 2015 07:28:00 GMT");
        assert!(!headers.contains_key(CONTENT_RANGE));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_partial_object_response() {
        let mut partial = object(vec![Ok(Bytes::from_static(b"ll"))]);
        partial.content_length = Some(2);
        partial.content_range = Some(ContentRange { start: 2, end: 3, total: 5 });

        let response = relay(&key(), ReadOutcome::Object(partial));
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[CONTENT_RANGE], "bytes 2-3/5");
        assert_eq!(response.headers()[CONTENT_LENGTH], "2");
    }

    #[tokio::test]
    async fn test_missing_content_type_defaults() {
        let mut untyped = object(vec![]);
        untyped.content_type = None;
        untyped.content_length = Some(0);
        let response = relay(&key(), ReadOutcome::Object(untyped));
        assert_eq!(response.headers()[CONTENT_TYPE], DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_invalid_metadata_is_skipped() {
        let mut odd = object(vec![]);
        odd.content_type = Some("text/plain\n".to_string());
        odd.cache_control = Some("bad\u{7f}".to_string());
        let response = relay(&key(), ReadOutcome::Object(odd));
        assert_eq!(response.headers()[CONTENT_TYPE], DEFAULT_CONTENT_TYPE);
        assert!(!response.headers().contains_key(CACHE_CONTROL));
    }

    #[tokio::test]
    async fn test_not_modified_response() {
        let outcome = ReadOutcome::NotModified {
            etag: Some(ETag::try_new("\"v1\"").unwrap()),
        };
        let response = relay(&key(), outcome);
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.headers()[ETAG], "\"v1\"");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_mid_stream_error_surfaces_to_body() {
        let failing = object(vec![
            Ok(Bytes::from_static(b"he")),
            Err(std::io::Error::other("connection reset")),
        ]);
        let response = relay(&key(), ReadOutcome::Object(failing));
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.into_body().collect().await.is_err());
    }

    #[tokio::test]
    async fn test_relay_stream_passes_chunks_through() {
        use futures_util::StreamExt;

        let chunks: Vec<std::io::Result<Bytes>> =
            vec![Ok(Bytes::from_static(b"abc")), Ok(Bytes::from_static(b"de"))];
        let body: ObjectBody = Box::pin(stream::iter(chunks));
        let relayed: Vec<Bytes> = RelayStream::new(body, key(), Some(5))
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert_eq!(relayed, vec![Bytes::from_static(b"abc"), Bytes::from_static(b"de")]);
    }
}
