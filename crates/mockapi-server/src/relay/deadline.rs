//! Relayed response body bounded by the relay deadline.

use super::RelayError;
use crate::body::{BoxError, ServeBody};
use hyper::body::{Body, Bytes, Frame, SizeHint};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep};
use tracing::error;

/// Body that fails once `deadline` passes before the upstream finishes.
pub struct DeadlineBody {
    inner: ServeBody,
    deadline: Pin<Box<Sleep>>,
    budget: Duration,
    expired: bool,
}

impl DeadlineBody {
    pub fn new(inner: ServeBody, deadline: Instant, budget: Duration) -> Self {
        Self {
            inner,
            deadline: Box::pin(tokio::time::sleep_until(deadline)),
            budget,
            expired: false,
        }
    }
}

impl Body for DeadlineBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        let this = &mut *self;
        if this.expired {
            return Poll::Ready(None);
        }
        if let Poll::Ready(frame) = Pin::new(&mut this.inner).poll_frame(cx) {
            return Poll::Ready(frame);
        }
        match this.deadline.as_mut().poll(cx) {
            Poll::Ready(()) => {
                this.expired = true;
                error!("Relayed body not finished within {:?}", this.budget);
                Poll::Ready(Some(Err(RelayError::Timeout(this.budget).into())))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.expired || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::full;
    use http_body_util::BodyExt;

    /// Yields one frame, then never makes progress.
    struct Stalled {
        sent: bool,
    }

    impl Body for Stalled {
        type Data = Bytes;
        type Error = BoxError;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
            if self.sent {
                Poll::Pending
            } else {
                self.sent = true;
                Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(b"partial")))))
            }
        }
    }

    #[tokio::test]
    async fn test_finished_body_passes_through() {
        let budget = Duration::from_secs(5);
        let body = DeadlineBody::new(full("complete"), Instant::now() + budget, budget);
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"complete");
    }

    #[tokio::test]
    async fn test_stalled_body_fails_at_deadline() {
        let budget = Duration::from_millis(100);
        let inner: ServeBody = Stalled { sent: false }.boxed();
        let started = std::time::Instant::now();

        let result = DeadlineBody::new(inner, Instant::now() + budget, budget)
            .collect()
            .await;

        assert!(result.is_err());
        assert!(started.elapsed() >= budget);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
