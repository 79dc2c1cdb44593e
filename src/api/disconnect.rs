use crate::core::StreamCancelHandle;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Response body wrapper that fires a cancellation handle when dropped.
///
/// The HTTP server drops the body when the client goes away (or after the
/// last chunk was sent). If the relay has not marked the handle completed by
/// then, the drop is a disconnect.
pub struct DisconnectStream<S> {
    pub stream: S,
    pub cancel_handle: StreamCancelHandle,
}

impl<S> DisconnectStream<S> {
    pub fn new(stream: S, cancel_handle: StreamCancelHandle) -> Self {
        Self {
            stream,
            cancel_handle,
        }
    }
}

impl<S> Stream for DisconnectStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }
}

impl<S> Drop for DisconnectStream<S> {
    fn drop(&mut self) {
        if !self.cancel_handle.is_completed() {
            tracing::debug!("Response body dropped before relay finished");
        }
        self.cancel_handle.cancel();
    }
}
