//! Channel-backed event stream

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use eventsource_core::Event;

use crate::error::EventSourceError;

/// Events of an [`EventSource`](crate::EventSource) as a `Stream`
///
/// Yields `Ok(event)` for every dispatched event and `Err(error)` when the
/// session ends fatally. Reconnects are invisible here. The stream finishes
/// once the event source has been dropped.
///
/// # Example
///
/// ```no_run
/// use eventsource_client::{EventSource, EventSourceConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (source, mut events) =
///     EventSource::subscribe(EventSourceConfig::new("http://localhost:8080/events"))?;
/// source.open()?;
///
/// while let Some(item) = events.next().await {
///     match item {
///         Ok(event) => println!("{}", event.data),
///         Err(e) => {
///             eprintln!("Stream error: {}", e);
///             break;
///         }
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct EventStream {
    inner: UnboundedReceiverStream<Result<Event, EventSourceError>>,
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Result<Event, EventSourceError>>) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(rx),
        }
    }

    /// Get the next event from the stream
    pub async fn next(&mut self) -> Option<Result<Event, EventSourceError>> {
        <Self as StreamExt>::next(self).await
    }
}

impl Stream for EventStream {
    type Item = Result<Event, EventSourceError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
