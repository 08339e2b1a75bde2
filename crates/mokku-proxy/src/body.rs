//! Re-entrant request body: read once for inspection, replay for a handler.
//!
//! Request bodies are single-read streams. The interceptor must look at the
//! JSON before the typed handlers extract it, so the body is buffered into
//! `Bytes` once and every consumer gets its own `Body` over the same buffer.

use axum::BoxError;
use axum::body::Body;
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use thiserror::Error;

/// Why a body could not be buffered.
#[derive(Debug, Error)]
pub enum BodyReadError {
    /// The body is longer than the configured cap.
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// The underlying stream failed (e.g. client disconnect mid-body).
    #[error("failed to read request body: {0}")]
    Stream(String),
}

/// A fully buffered request body.
#[derive(Debug, Clone)]
pub struct BufferedBody {
    bytes: Bytes,
}

impl BufferedBody {
    /// Drain `body` into memory, failing once more than `limit` bytes arrive.
    ///
    /// A stream error is reported as such; the partial buffer is discarded.
    pub async fn read(body: Body, limit: usize) -> Result<Self, BodyReadError> {
        let collected = Limited::new(body, limit)
            .collect()
            .await
            .map_err(|err| classify(err, limit))?;

        Ok(Self {
            bytes: collected.to_bytes(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// A fresh body positioned at the start of the buffer.
    ///
    /// Cloning `Bytes` shares the allocation; each returned body has its own
    /// read position.
    pub fn replay(&self) -> Body {
        Body::from(self.bytes.clone())
    }
}

fn classify(err: BoxError, limit: usize) -> BodyReadError {
    if err.is::<LengthLimitError>() {
        BodyReadError::TooLarge { limit }
    } else {
        BodyReadError::Stream(err.to_string())
    }
}
