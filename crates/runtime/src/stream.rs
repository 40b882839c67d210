//! Pull-based stream of generated text fragments.

use crate::Result;
use futures_core::Stream;
use futures_util::StreamExt;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

type Inner = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A lazy, finite, non-restartable sequence of text fragments.
///
/// The stream owns the vendor connection. It is released as soon as the
/// stream is exhausted, yields an error, is [`close`](Self::close)d, or is
/// dropped; after that every call to [`next`](Self::next) returns `None`.
pub struct TextStream {
    provider: String,
    inner: Option<Inner>,
}

impl TextStream {
    /// Wrap a fragment stream produced by `provider`.
    pub fn new<S>(provider: impl Into<String>, stream: S) -> Self
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        Self {
            provider: provider.into(),
            inner: Some(Box::pin(stream)),
        }
    }

    /// Name of the provider producing this stream.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Pull the next fragment.
    pub async fn next(&mut self) -> Option<Result<String>> {
        let inner = self.inner.as_mut()?;
        let item = inner.next().await;
        if !matches!(item, Some(Ok(_))) {
            self.release();
        }
        item
    }

    /// Stop consuming and release the underlying connection.
    pub fn close(&mut self) {
        if self.inner.is_some() {
            debug!(provider = %self.provider, "closing text stream early");
            self.release();
        }
    }

    /// Whether the stream has been exhausted or closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Drain the stream, concatenating every fragment.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }

    fn release(&mut self) {
        self.inner = None;
    }
}

impl Stream for TextStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };
        let poll = inner.as_mut().poll_next(cx);
        match poll {
            Poll::Ready(Some(Ok(fragment))) => Poll::Ready(Some(Ok(fragment))),
            Poll::Ready(other) => {
                self.release();
                Poll::Ready(other)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl fmt::Debug for TextStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextStream")
            .field("provider", &self.provider)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use futures_util::stream;

    fn fragments(items: Vec<Result<String>>) -> TextStream {
        TextStream::new("test", stream::iter(items))
    }

    #[tokio::test]
    async fn collects_in_order() {
        let s = fragments(vec![Ok("Hel".into()), Ok("lo".into()), Ok("!".into())]);
        assert_eq!(s.collect_text().await.unwrap(), "Hello!");
    }

    #[tokio::test]
    async fn fused_after_error() {
        let mut s = fragments(vec![
            Ok("a".into()),
            Err(Error::upstream("test", "connection reset")),
            Ok("never".into()),
        ]);
        assert_eq!(s.next().await.unwrap().unwrap(), "a");
        assert!(s.next().await.unwrap().is_err());
        assert!(s.is_closed());
        assert!(s.next().await.is_none());
    }

    #[tokio::test]
    async fn close_stops_iteration() {
        let mut s = fragments(vec![Ok("a".into()), Ok("b".into())]);
        assert_eq!(s.next().await.unwrap().unwrap(), "a");
        s.close();
        assert!(s.is_closed());
        assert!(s.next().await.is_none());
    }

    #[tokio::test]
    async fn usable_as_futures_stream() {
        let s = fragments(vec![Ok("x".into()), Ok("y".into())]);
        let all: Vec<String> = StreamExt::map(s, |r| r.unwrap()).collect().await;
        assert_eq!(all, vec!["x", "y"]);
    }
}
