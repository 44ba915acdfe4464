//! Streaming HTTP delivery of converted files.
//!
//! The response body owns the job's [`TempArtifactTracker`]: the scratch
//! files stay on disk while hyper streams the output and are removed when
//! the body is dropped, whether it finished, failed, or the client left.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::Response;
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use docforge_converter::{
    ConversionError, ConversionMetrics, Delivery, DeliverySink, TempArtifactTracker,
};

/// Delivers outputs as streaming `attachment` responses.
pub struct HttpDelivery {
    metrics: Arc<ConversionMetrics>,
}

impl HttpDelivery {
    /// Create a sink that reports broken streams to `metrics`.
    pub fn new(metrics: Arc<ConversionMetrics>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl DeliverySink for HttpDelivery {
    type Output = Response;

    async fn deliver(&self, delivery: Delivery) -> Result<Response, ConversionError> {
        let file = tokio::fs::File::open(&delivery.path)
            .await
            .map_err(|e| ConversionError::DeliveryFailed {
                reason: format!("failed to open output: {e}"),
            })?;

        let disposition = format!("attachment; filename=\"{}\"", delivery.download_name);
        let stream = TrackedStream::new(
            ReaderStream::new(file),
            delivery.tracker,
            delivery.size_bytes,
            Arc::clone(&self.metrics),
        );

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, delivery.content_type)
            .header(header::CONTENT_DISPOSITION, disposition)
            .header(header::CONTENT_LENGTH, delivery.size_bytes)
            .body(Body::from_stream(stream))
            .map_err(|e| ConversionError::DeliveryFailed {
                reason: format!("response build failed: {e}"),
            })
    }
}

pin_project! {
    /// Byte stream that keeps a job's scratch files alive until dropped.
    ///
    /// `inner` is declared first so the output file handle closes before
    /// the tracker deletes the file.
    pub struct TrackedStream<S> {
        #[pin]
        inner: S,
        tracker: TempArtifactTracker,
        metrics: Arc<ConversionMetrics>,
        expected_bytes: u64,
        sent_bytes: u64,
        finished: bool,
    }

    impl<S> PinnedDrop for TrackedStream<S> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if !*this.finished {
                warn!(
                    job_id = %this.tracker.job_id(),
                    sent = *this.sent_bytes,
                    expected = *this.expected_bytes,
                    "Delivery aborted before completion"
                );
                this.metrics.record_delivery_failure();
            }
        }
    }
}

impl<S> TrackedStream<S> {
    /// Wrap `inner`, taking ownership of the job's tracker.
    pub fn new(
        inner: S,
        tracker: TempArtifactTracker,
        expected_bytes: u64,
        metrics: Arc<ConversionMetrics>,
    ) -> Self {
        Self {
            inner,
            tracker,
            metrics,
            expected_bytes,
            sent_bytes: 0,
            finished: false,
        }
    }
}

impl<S> Stream for TrackedStream<S>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.finished {
            return Poll::Ready(None);
        }

        match ready!(this.inner.poll_next(cx)) {
            Some(Ok(chunk)) => {
                *this.sent_bytes += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                *this.finished = true;
                warn!(
                    job_id = %this.tracker.job_id(),
                    sent = *this.sent_bytes,
                    error = %e,
                    "Delivery stream failed"
                );
                this.metrics.record_delivery_failure();
                Poll::Ready(Some(Err(e)))
            }
            None => {
                *this.finished = true;
                info!(
                    job_id = %this.tracker.job_id(),
                    bytes = *this.sent_bytes,
                    "Delivery complete"
                );
                Poll::Ready(None)
            }
        }
    }
}
