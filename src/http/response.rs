//! The streaming response writer handed to handlers.
//!
//! # Responsibilities
//! - Collect status and headers until the head is committed
//! - Commit the head on first body write (or when the handler finishes)
//! - Stream body chunks to the connection through a bounded channel
//! - Abort cleanly on a fault: 500 before commit, broken stream after
//!
//! # Design Decisions
//! - The head is sent over a oneshot channel; the dispatcher builds the
//!   `Response` as soon as it arrives, so bodies stream while handlers run
//! - Changes to status or headers after commit are ignored and logged
//! - The state lock is never held across an await

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::http::header::{HeaderName, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::binder::WriteError;

pub(crate) type BodyChunk = Result<Bytes, io::Error>;

/// Status, headers and the receiving end of the body.
pub(crate) struct Head {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: mpsc::Receiver<BodyChunk>,
}

struct WriterState {
    status: StatusCode,
    headers: HeaderMap,
    head_tx: Option<oneshot::Sender<Head>>,
    body_rx: Option<mpsc::Receiver<BodyChunk>>,
    body_tx: Option<mpsc::Sender<BodyChunk>>,
    bytes_written: u64,
}

impl WriterState {
    fn is_committed(&self) -> bool {
        self.head_tx.is_none()
    }

    fn commit(&mut self) {
        if let (Some(tx), Some(body)) = (self.head_tx.take(), self.body_rx.take()) {
            let head = Head {
                status: self.status,
                headers: self.headers.clone(),
                body,
            };
            // Receiver gone means the client went away; later writes observe it.
            let _ = tx.send(head);
        }
    }
}

/// Writes the response for one request.
///
/// Cheap to clone; all clones write to the same response.
#[derive(Clone)]
pub struct ResponseWriter {
    state: Arc<Mutex<WriterState>>,
}

impl ResponseWriter {
    /// Create a writer and the receiver its head will be committed to.
    pub(crate) fn channel(buffer: usize) -> (Self, oneshot::Receiver<Head>) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(buffer.max(1));
        let state = WriterState {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            head_tx: Some(head_tx),
            body_rx: Some(body_rx),
            body_tx: Some(body_tx),
            bytes_written: 0,
        };
        (
            Self {
                state: Arc::new(Mutex::new(state)),
            },
            head_rx,
        )
    }

    fn lock(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> StatusCode {
        self.lock().status
    }

    pub fn set_status(&self, status: StatusCode) {
        let mut state = self.lock();
        if state.is_committed() {
            tracing::warn!(status = status.as_u16(), "Status set after response was committed; ignored");
            return;
        }
        state.status = status;
    }

    pub fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.lock().headers.get(name).cloned()
    }

    /// Replace all values of a header.
    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        let mut state = self.lock();
        if state.is_committed() {
            tracing::warn!(header = %name, "Header set after response was committed; ignored");
            return;
        }
        state.headers.insert(name, value);
    }

    /// Add a header value, keeping existing ones.
    pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
        let mut state = self.lock();
        if state.is_committed() {
            tracing::warn!(header = %name, "Header added after response was committed; ignored");
            return;
        }
        state.headers.append(name, value);
    }

    /// Add every value of `headers`.
    pub fn merge_headers(&self, headers: HeaderMap) {
        let mut state = self.lock();
        if state.is_committed() {
            tracing::warn!(count = headers.len(), "Headers added after response was committed; ignored");
            return;
        }
        let mut current: Option<HeaderName> = None;
        for (name, value) in headers {
            if let Some(name) = name {
                current = Some(name);
            }
            if let Some(name) = &current {
                state.headers.append(name.clone(), value);
            }
        }
    }

    /// Set `Content-Type` unless the handler already chose one.
    pub fn default_content_type(&self, value: &'static str) {
        let mut state = self.lock();
        if !state.is_committed() && !state.headers.contains_key(CONTENT_TYPE) {
            state.headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
        }
    }

    pub fn is_committed(&self) -> bool {
        self.lock().is_committed()
    }

    pub fn bytes_written(&self) -> u64 {
        self.lock().bytes_written
    }

    /// Write a body chunk, committing the head first if needed.
    pub async fn write(&self, data: impl Into<Bytes>) -> Result<usize, WriteError> {
        let data = data.into();
        let len = data.len();
        let tx = {
            let mut state = self.lock();
            state.commit();
            state.bytes_written += len as u64;
            state.body_tx.clone()
        }
        .ok_or(WriteError::Disconnected)?;

        if len > 0 {
            tx.send(Ok(data)).await.map_err(|_| WriteError::Disconnected)?;
        }
        Ok(len)
    }

    /// Commit the head if nothing was written and close the body.
    pub(crate) fn finish(&self) {
        let mut state = self.lock();
        state.commit();
        state.body_tx = None;
    }

    /// Abort the response after a fault.
    ///
    /// Before commit the client gets `status` with its canonical reason as a
    /// plain-text body. After commit the body stream ends with an error so the
    /// connection is torn down instead of looking complete.
    pub(crate) async fn abort(&self, status: StatusCode) {
        let (tx, chunk) = {
            let mut state = self.lock();
            if state.is_committed() {
                let chunk = Err(io::Error::other("response aborted"));
                (state.body_tx.take(), chunk)
            } else {
                state.status = status;
                state.headers.clear();
                state
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
                state.commit();
                let reason = status.canonical_reason().unwrap_or("Error");
                (state.body_tx.take(), Ok(Bytes::from(format!("{reason}\n"))))
            }
        };
        if let Some(tx) = tx {
            let _ = tx.send(chunk).await;
        }
    }
}

impl std::fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ResponseWriter")
            .field("status", &state.status)
            .field("committed", &state.is_committed())
            .field("bytes_written", &state.bytes_written)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Drain a committed head into (status, headers, body).
    pub(crate) async fn collect(head: Head) -> (StatusCode, HeaderMap, Result<Vec<u8>, io::Error>) {
        let Head { status, headers, mut body } = head;
        let mut out = Vec::new();
        while let Some(chunk) = body.recv().await {
            match chunk {
                Ok(bytes) => out.extend_from_slice(&bytes),
                Err(e) => return (status, headers, Err(e)),
            }
        }
        (status, headers, Ok(out))
    }

    #[tokio::test]
    async fn test_write_commits_head() {
        let (writer, head_rx) = ResponseWriter::channel(4);
        writer.set_status(StatusCode::CREATED);
        writer.insert_header(HeaderName::from_static("x-a"), HeaderValue::from_static("1"));
        writer.write("hello").await.unwrap();
        assert!(writer.is_committed());

        // ignored after commit
        writer.set_status(StatusCode::IM_A_TEAPOT);
        writer.insert_header(HeaderName::from_static("x-b"), HeaderValue::from_static("2"));
        writer.finish();

        let (status, headers, body) = collect(head_rx.await.unwrap()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(headers["x-a"], "1");
        assert!(!headers.contains_key("x-b"));
        assert_eq!(body.unwrap(), b"hello");
        assert_eq!(writer.bytes_written(), 5);
    }

    #[tokio::test]
    async fn test_finish_without_body() {
        let (writer, head_rx) = ResponseWriter::channel(1);
        writer.set_status(StatusCode::NO_CONTENT);
        writer.finish();

        let (status, _, body) = collect(head_rx.await.unwrap()).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.unwrap().is_empty());
        assert!(matches!(writer.write("late").await, Err(WriteError::Disconnected)));
    }

    #[tokio::test]
    async fn test_abort_before_commit() {
        let (writer, head_rx) = ResponseWriter::channel(1);
        writer.insert_header(HeaderName::from_static("x-a"), HeaderValue::from_static("1"));
        writer.abort(StatusCode::INTERNAL_SERVER_ERROR).await;

        let (status, headers, body) = collect(head_rx.await.unwrap()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!headers.contains_key("x-a"));
        assert_eq!(body.unwrap(), b"Internal Server Error\n");
    }

    #[tokio::test]
    async fn test_abort_after_commit() {
        let (writer, head_rx) = ResponseWriter::channel(4);
        writer.write("partial").await.unwrap();
        writer.abort(StatusCode::INTERNAL_SERVER_ERROR).await;

        let Head { status, mut body, .. } = head_rx.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.recv().await.unwrap().unwrap(), "partial");
        assert!(body.recv().await.unwrap().is_err());
        assert!(body.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_abort_with_payload_too_large() {
        let (writer, head_rx) = ResponseWriter::channel(1);
        writer.abort(StatusCode::PAYLOAD_TOO_LARGE).await;

        let (status, _, body) = collect(head_rx.await.unwrap()).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body.unwrap(), b"Payload Too Large\n");
    }

    #[tokio::test]
    async fn test_merge_keeps_multiple_values() {
        let (writer, head_rx) = ResponseWriter::channel(1);
        let mut extra = HeaderMap::new();
        extra.append("x-multi", HeaderValue::from_static("a"));
        extra.append("x-multi", HeaderValue::from_static("b"));
        writer.merge_headers(extra);
        writer.finish();

        let (_, headers, _) = collect(head_rx.await.unwrap()).await;
        let values: Vec<_> = headers.get_all("x-multi").iter().collect();
        assert_eq!(values, ["a", "b"]);
    }
}
