//! Generic progress tracking for streamed responses.
//!
//! A `StreamProgress<T>` drains one asynchronous sequence at a time, publishes
//! an immutable snapshot of everything received so far after every item, and
//! turns both transport failures and in-band error items into a single
//! `error` string.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::{Stream, StreamExt as _};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::errors::StreamFailure;

/// Boxed sequence of items pulled by `StreamProgress::start`.
pub type ItemStream<T> = Pin<Box<dyn Stream<Item = Result<T, StreamFailure>> + Send + 'static>>;

type ExtractErrorFn<T> = Arc<dyn Fn(&T) -> Option<String> + Send + Sync>;
type PartialFn<T> = Arc<dyn Fn(&T, &[T]) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&StreamFailure) + Send + Sync>;
type CompleteFn<T> = Arc<dyn Fn(&[T], bool) + Send + Sync>;

/// Observable state of one `StreamProgress` instance.
///
/// `items` is replaced by a fresh `Arc` on every append, so a snapshot held by
/// a reader never changes underneath it.
#[derive(Clone, Debug)]
pub struct StreamState<T> {
    /// Items in arrival order.
    pub items: Arc<Vec<T>>,
    pub is_streaming: bool,
    pub aborted: bool,
    /// Transport or in-band failure message for the current run.
    pub error: Option<String>,
    pub last_item: Option<T>,
    pub count: usize,
}

impl<T> Default for StreamState<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            is_streaming: false,
            aborted: false,
            error: None,
            last_item: None,
            count: 0,
        }
    }
}

struct Callbacks<T> {
    extract_error: Option<ExtractErrorFn<T>>,
    on_partial: Option<PartialFn<T>>,
    on_error: Option<ErrorFn>,
    on_complete: Option<CompleteFn<T>>,
}

struct Inner<T> {
    label: String,
    state: watch::Sender<StreamState<T>>,
    generation: AtomicU64,
    /// Generation of the last run an abort was requested for.
    aborted_generation: AtomicU64,
    callbacks: Callbacks<T>,
}

/// Builder for a `StreamProgress` with caller-supplied hooks.
pub struct StreamProgressBuilder<T> {
    label: String,
    callbacks: Callbacks<T>,
}

impl<T> StreamProgressBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Sets the function that inspects each item for an in-band failure.
    ///
    /// Returning a non-empty string stops the run and records the message.
    pub fn extract_error(
        mut self,
        f: impl Fn(&T) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.extract_error = Some(Arc::new(f));
        self
    }

    /// Called after each accepted item with the item and all items so far.
    pub fn on_partial(mut self, f: impl Fn(&T, &[T]) + Send + Sync + 'static) -> Self {
        self.callbacks.on_partial = Some(Arc::new(f));
        self
    }

    /// Called once when a run fails (transport or in-band).
    pub fn on_error(mut self, f: impl Fn(&StreamFailure) + Send + Sync + 'static) -> Self {
        self.callbacks.on_error = Some(Arc::new(f));
        self
    }

    /// Called when a run ends without failure; the flag reports an abort.
    pub fn on_complete(mut self, f: impl Fn(&[T], bool) + Send + Sync + 'static) -> Self {
        self.callbacks.on_complete = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> StreamProgress<T> {
        let (state, _) = watch::channel(StreamState::default());
        StreamProgress {
            inner: Arc::new(Inner {
                label: self.label,
                state,
                generation: AtomicU64::new(0),
                aborted_generation: AtomicU64::new(0),
                callbacks: self.callbacks,
            }),
        }
    }
}

/// Drains streamed responses into an observable, append-only item history.
///
/// Cloning yields another handle to the same state, so one task can `start`
/// a run while another observes it or calls `abort`.
pub struct StreamProgress<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for StreamProgress<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> StreamProgress<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an instance without hooks. `label` tags log records.
    pub fn new(label: impl Into<String>) -> Self {
        Self::builder(label).build()
    }

    pub fn builder(label: impl Into<String>) -> StreamProgressBuilder<T> {
        StreamProgressBuilder {
            label: label.into(),
            callbacks: Callbacks {
                extract_error: None,
                on_partial: None,
                on_error: None,
                on_complete: None,
            },
        }
    }

    /// Runs the sequence produced by `factory` to completion.
    ///
    /// Does nothing when a run is already streaming. Prior state is cleared
    /// before the factory is invoked.
    pub async fn start<F, Fut>(&self, factory: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ItemStream<T>, StreamFailure>>,
    {
        let Some(generation) = self.begin() else {
            debug!(stream = %self.inner.label, "start ignored: already streaming");
            return;
        };
        info!(stream = %self.inner.label, generation, "stream started");
        match factory().await {
            Ok(stream) => self.drain(generation, stream).await,
            Err(failure) => self.fail(generation, failure),
        }
    }

    /// Runs an already-built sequence to completion.
    pub async fn start_stream(&self, stream: ItemStream<T>) {
        self.start(move || async move { Ok(stream) }).await;
    }

    /// Requests cancellation of the active run.
    ///
    /// `is_streaming` flips to false immediately, but the pull loop only
    /// observes the request at the next item boundary: an item already in
    /// flight still arrives (and is dropped).
    pub fn abort(&self) {
        let inner = &self.inner;
        let changed = inner.state.send_if_modified(|state| {
            if !state.is_streaming {
                return false;
            }
            inner.aborted_generation.store(
                inner.generation.load(Ordering::SeqCst),
                Ordering::SeqCst,
            );
            state.aborted = true;
            state.is_streaming = false;
            true
        });
        if changed {
            info!(stream = %self.inner.label, "abort requested");
        }
    }

    /// Clears all state. An in-flight pull is not cancelled; call `abort`
    /// first to guarantee no further mutation.
    pub fn reset(&self) {
        self.inner.state.send_modify(|state| *state = StreamState::default());
    }

    /// Returns the current state.
    pub fn snapshot(&self) -> StreamState<T> {
        self.inner.state.borrow().clone()
    }

    /// Subscribes to state changes. Every append publishes a new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<StreamState<T>> {
        self.inner.state.subscribe()
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.state.borrow().is_streaming
    }

    pub fn items(&self) -> Arc<Vec<T>> {
        self.inner.state.borrow().items.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    fn begin(&self) -> Option<u64> {
        let inner = &self.inner;
        let mut generation = None;
        inner.state.send_if_modified(|state| {
            if state.is_streaming {
                return false;
            }
            generation = Some(inner.generation.fetch_add(1, Ordering::SeqCst) + 1);
            *state = StreamState {
                is_streaming: true,
                ..StreamState::default()
            };
            true
        });
        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
    }

    fn abort_requested(&self, generation: u64) -> bool {
        self.inner.aborted_generation.load(Ordering::SeqCst) == generation
    }

    async fn drain(&self, generation: u64, mut stream: ItemStream<T>) {
        let mut items: Arc<Vec<T>> = Arc::new(Vec::new());
        loop {
            let next = stream.next().await;
            if !self.is_current(generation) {
                debug!(
                    stream = %self.inner.label,
                    generation,
                    "stale run superseded; dropping stream"
                );
                return;
            }
            let item = match next {
                Some(Ok(item)) => item,
                Some(Err(failure)) => {
                    self.fail(generation, failure);
                    return;
                }
                None => break,
            };
            if self.abort_requested(generation) {
                break;
            }

            let mut next_items = Vec::with_capacity(items.len() + 1);
            next_items.extend(items.iter().cloned());
            next_items.push(item.clone());
            items = Arc::new(next_items);
            let published = items.clone();
            let last = item.clone();
            self.inner.state.send_modify(|state| {
                state.count = published.len();
                state.items = published;
                state.last_item = Some(last);
            });
            debug!(
                stream = %self.inner.label,
                generation,
                count = items.len(),
                "stream item received"
            );

            let in_band = self
                .inner
                .callbacks
                .extract_error
                .as_ref()
                .and_then(|extract| extract(&item))
                .filter(|message| !message.is_empty());
            if let Some(message) = in_band {
                self.fail(generation, StreamFailure::in_band(message));
                return;
            }
            if let Some(on_partial) = &self.inner.callbacks.on_partial {
                on_partial(&item, items.as_slice());
            }
        }
        self.complete(generation, items.as_slice());
    }

    fn complete(&self, generation: u64, items: &[T]) {
        if !self.is_current(generation) {
            return;
        }
        let aborted = self.abort_requested(generation);
        self.inner.state.send_modify(|state| state.is_streaming = false);
        info!(
            stream = %self.inner.label,
            generation,
            count = items.len(),
            aborted,
            "stream finished"
        );
        if let Some(on_complete) = &self.inner.callbacks.on_complete {
            on_complete(items, aborted);
        }
    }

    fn fail(&self, generation: u64, failure: StreamFailure) {
        if !self.is_current(generation) {
            return;
        }
        warn!(stream = %self.inner.label, generation, error = %failure, "stream failed");
        let message = failure.message().to_string();
        self.inner.state.send_modify(|state| {
            state.error = Some(message);
            state.is_streaming = false;
        });
        if let Some(on_error) = &self.inner.callbacks.on_error {
            on_error(&failure);
        }
    }
}
