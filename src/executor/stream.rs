//! Streaming variant of the memoizing call.
//!
//! The returned stream is driven by the consumer: the store lookup happens on
//! the first poll, each chunk is pulled from the source only when asked for,
//! and backoff sleeps run inside the poll that hit the failure.
//!
//! States:
//! - `Lookup`: derive the hit/miss decision.
//! - `Replaying`: yield stored chunks verbatim.
//! - `Producing`: forward source chunks while accumulating them; write one
//!   record when the source is exhausted.
//! - `Retrying`: wait the next backoff, then start a fresh source.
//! - `Done` / `Failed`: finished.
//!
//! Chunks forwarded before a failure are not taken back, so a consumer can see
//! the partial output of a failed attempt followed by the full output of the
//! retry. Only the successful attempt's chunks are cached.

use super::stats::AtomicStats;
use super::{CallOptions, MemoCache, RetryState};
use crate::cache::{generate_key, CacheKey, CacheParams, CacheRecord, CallArgs};
use crate::error::BoxError;
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, error, info};

type SourceStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, BoxError>> + Send>>;
type SourceFactory = Box<dyn FnMut(CallArgs) -> SourceStream + Send>;

enum State {
    Lookup,
    Replaying(std::vec::IntoIter<String>),
    Producing {
        source: SourceStream,
        buffer: Vec<String>,
    },
    Retrying(Duration),
    Done,
    Failed,
}

struct StreamCall {
    cache: MemoCache,
    function: String,
    args: CallArgs,
    cache_params: CacheParams,
    key: CacheKey,
    retry: RetryState,
    attempt: u32,
    factory: SourceFactory,
    state: State,
}

impl StreamCall {
    async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::Lookup => {
                    let cached = self
                        .cache
                        .lookup::<Vec<String>>(&self.function, &self.key, &self.cache_params)
                        .await;
                    self.state = match cached {
                        Some(chunks) => State::Replaying(chunks.into_iter()),
                        None => self.start_attempt(),
                    };
                }
                State::Replaying(mut chunks) => {
                    let chunk = chunks.next()?;
                    self.state = State::Replaying(chunks);
                    return Some(Ok(Bytes::from(chunk)));
                }
                State::Producing {
                    mut source,
                    mut buffer,
                } => match source.next().await {
                    Some(Ok(chunk)) => match std::str::from_utf8(&chunk) {
                        Ok(text) => {
                            buffer.push(text.to_string());
                            self.state = State::Producing { source, buffer };
                            return Some(Ok(chunk));
                        }
                        Err(e) => {
                            if let Some(item) = self.fail(Box::new(e), buffer.len()) {
                                return Some(item);
                            }
                        }
                    },
                    Some(Err(err)) => {
                        if let Some(item) = self.fail(err, buffer.len()) {
                            return Some(item);
                        }
                    }
                    None => {
                        debug!(
                            function = %self.function,
                            cache_key = %self.key,
                            chunks = buffer.len(),
                            "stream complete"
                        );
                        let record = CacheRecord::new(buffer, self.cache_params.clone());
                        self.cache
                            .write_back(&self.function, &self.key, &record)
                            .await;
                        return None;
                    }
                },
                State::Retrying(delay) => {
                    tokio::time::sleep(delay).await;
                    self.attempt += 1;
                    self.state = self.start_attempt();
                }
                State::Done => return None,
                State::Failed => {
                    self.state = State::Failed;
                    return None;
                }
            }
        }
    }

    fn start_attempt(&mut self) -> State {
        debug!(
            function = %self.function,
            cache_key = %self.key,
            attempt = self.attempt,
            "calling streaming function"
        );
        State::Producing {
            source: (self.factory)(self.args.clone()),
            buffer: Vec::new(),
        }
    }

    /// Drop the partial attempt. Schedules a retry, or yields the terminal error.
    fn fail(&mut self, err: BoxError, discarded: usize) -> Option<Result<Bytes>> {
        match self.retry.next_backoff() {
            Some(delay) => {
                AtomicStats::bump(&self.cache.stats.retries);
                info!(
                    function = %self.function,
                    attempt = self.attempt,
                    discarded_chunks = discarded,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "stream failed, restarting after backoff"
                );
                self.state = State::Retrying(delay);
                None
            }
            None => {
                AtomicStats::bump(&self.cache.stats.exhausted);
                error!(
                    function = %self.function,
                    attempts = self.attempt,
                    error = %err,
                    "no retries left for stream"
                );
                self.state = State::Failed;
                Some(Err(Error::StreamExhausted {
                    function: self.function.clone(),
                    attempts: self.attempt,
                    source: err,
                }))
            }
        }
    }
}

impl MemoCache {
    /// Streaming counterpart of [`MemoCache::call`].
    ///
    /// On a hit the stored chunks are replayed and `f` is never invoked. On a
    /// miss every chunk produced by `f` is forwarded as soon as it arrives and
    /// the complete sequence is written once the source ends. Chunks must be
    /// UTF-8; a chunk that is not counts as a failure of the attempt.
    ///
    /// The retry/backoff pair is validated here, before anything is read;
    /// all other work happens as the returned stream is polled. The only error
    /// item the stream yields is the final [`Error::StreamExhausted`].
    pub fn stream_call<F, S, E>(
        &self,
        function: &str,
        args: CallArgs,
        options: &CallOptions,
        mut f: F,
    ) -> Result<BoxStream<'static, Bytes>>
    where
        F: FnMut(CallArgs) -> S + Send + 'static,
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let retry = options.retry_state()?;
        let cache_params = args.cache_params(&options.exclude_params);
        let key = generate_key(function, &cache_params);

        let factory: SourceFactory = Box::new(move |args| {
            let source = f(args).map_err(|e| -> BoxError { e.into() });
            Box::pin(source) as SourceStream
        });

        let call = StreamCall {
            cache: self.clone(),
            function: function.to_string(),
            args,
            cache_params,
            key,
            retry,
            attempt: 1,
            factory,
            state: State::Lookup,
        };

        Ok(Box::pin(futures::stream::unfold(call, |mut call| async move {
            call.next_chunk().await.map(|item| (item, call))
        })))
    }
}
