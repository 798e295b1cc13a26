//! Per-request chunk pipeline.
//!
//! The pipeline pulls frames from an upstream stream, annotates data chunks
//! when the request is an HTML page in an enabled scope, and passes batches of
//! frames downstream in arrival order. Upstream reads start out non-blocking;
//! when a read would block, everything transformed so far is flushed
//! downstream before the pipeline waits for more input.

use std::io;
use std::mem;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Local, TimeZone, Utc};
use futures::{FutureExt, Stream, StreamExt};
use metrics::counter;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use crate::application::delivery::record_delivery;
use crate::application::repos::CacheStateStore;
use crate::application::rewrite::BufferRewriter;
use crate::application::scanner::scan;
use crate::domain::behavior::BehaviorConfig;

const HTML_CONTENT_TYPE: &str = "text/html";

/// One unit of the response body stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data(Bytes),
    /// Forward everything buffered so far; the stream stays open.
    Flush,
    /// Forward everything buffered so far and finish.
    EndOfStream,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read response body: {0}")]
    Upstream(#[source] io::Error),
    #[error("failed to pass response body downstream: {0}")]
    Downstream(#[source] io::Error),
}

/// Receiver of transformed frames.
#[async_trait]
pub trait Downstream: Send {
    async fn pass(&mut self, batch: Vec<Frame>) -> Result<(), PipelineError>;
}

/// Request metadata the pipeline reads and may adjust.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub uri: String,
    pub content_type: Option<String>,
}

impl RequestHead {
    pub fn new(uri: impl Into<String>, content_type: Option<String>) -> Self {
        Self {
            uri: uri.into(),
            content_type,
        }
    }

    fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|value| value.starts_with(HTML_CONTENT_TYPE))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Serving a captured copy: record the view, adjust the content type, pass bytes through.
    CacheDelivery,
    /// Scan and annotate every data chunk.
    Annotate,
    Passthrough,
}

impl FilterMode {
    pub fn select(config: &BehaviorConfig, head: &RequestHead) -> Self {
        if config.cache_delivery {
            FilterMode::CacheDelivery
        } else if config.enabled && head.is_html() {
            FilterMode::Annotate
        } else {
            FilterMode::Passthrough
        }
    }
}

/// Counters for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub mode: FilterMode,
    pub chunks: usize,
    pub links_matched: usize,
    pub links_annotated: usize,
    pub links_enqueued: usize,
    pub degraded_chunks: usize,
}

impl PipelineSummary {
    fn new(mode: FilterMode) -> Self {
        Self {
            mode,
            chunks: 0,
            links_matched: 0,
            links_annotated: 0,
            links_enqueued: 0,
            degraded_chunks: 0,
        }
    }
}

pub struct ChunkPipeline<Tz: TimeZone = Local> {
    store: Arc<dyn CacheStateStore>,
    config: BehaviorConfig,
    zone: Tz,
}

impl ChunkPipeline<Local> {
    /// Pipeline rendering capture dates in the host's local time.
    pub fn new(store: Arc<dyn CacheStateStore>, config: BehaviorConfig) -> Self {
        Self::with_zone(store, config, Local)
    }
}

impl<Tz> ChunkPipeline<Tz>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    pub fn with_zone(store: Arc<dyn CacheStateStore>, config: BehaviorConfig, zone: Tz) -> Self {
        Self {
            store,
            config,
            zone,
        }
    }

    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    /// Drive one response body from `upstream` to `downstream`.
    ///
    /// Returns once an end-of-stream frame has been passed on, or the upstream
    /// is exhausted. A downstream failure stops the run immediately.
    #[instrument(skip_all, fields(uri = %head.uri))]
    pub async fn run<S, D>(
        &self,
        head: &mut RequestHead,
        mut upstream: S,
        downstream: &mut D,
    ) -> Result<PipelineSummary, PipelineError>
    where
        S: Stream<Item = io::Result<Frame>> + Unpin + Send,
        D: Downstream + ?Sized,
    {
        let mode = FilterMode::select(&self.config, head);
        let mut summary = PipelineSummary::new(mode);
        debug!(?mode, content_type = ?head.content_type, "pipeline start");

        if mode == FilterMode::CacheDelivery {
            record_delivery(self.store.as_ref(), head, Utc::now().timestamp()).await;
        }

        let mut batch = Vec::new();
        let mut blocking = false;

        loop {
            let next = if blocking {
                upstream.next().await
            } else {
                match upstream.next().now_or_never() {
                    Some(next) => next,
                    None => {
                        batch.push(Frame::Flush);
                        downstream.pass(mem::take(&mut batch)).await?;
                        blocking = true;
                        continue;
                    }
                }
            };

            match next {
                Some(Ok(Frame::Data(chunk))) => {
                    blocking = false;
                    summary.chunks += 1;
                    let chunk = match mode {
                        FilterMode::Annotate => self.annotate_chunk(chunk, &mut summary).await,
                        FilterMode::CacheDelivery | FilterMode::Passthrough => chunk,
                    };
                    batch.push(Frame::Data(chunk));
                }
                Some(Ok(Frame::Flush)) => {
                    batch.push(Frame::Flush);
                    downstream.pass(mem::take(&mut batch)).await?;
                }
                Some(Ok(Frame::EndOfStream)) => {
                    batch.push(Frame::EndOfStream);
                    downstream.pass(batch).await?;
                    debug!(?summary, "pipeline end");
                    return Ok(summary);
                }
                Some(Err(err)) => {
                    if !batch.is_empty() {
                        downstream.pass(batch).await?;
                    }
                    return Err(PipelineError::Upstream(err));
                }
                None => {
                    if !batch.is_empty() {
                        downstream.pass(batch).await?;
                    }
                    warn!(?summary, "upstream closed without end of stream");
                    return Ok(summary);
                }
            }
        }
    }

    async fn annotate_chunk(&self, chunk: Bytes, summary: &mut PipelineSummary) -> Bytes {
        let matches = match scan(&chunk) {
            Ok(matches) => matches,
            Err(err) => {
                warn!(error = %err, "link scan failed, forwarding chunk unchanged");
                summary.degraded_chunks += 1;
                return chunk;
            }
        };
        if matches.is_empty() {
            return chunk;
        }

        summary.links_matched += matches.len();
        counter!("amberlink_links_scanned_total").increment(matches.len() as u64);

        let mut session = match self.store.open().await {
            Ok(session) => session,
            Err(err) => {
                error!(error = %err, "cache store unavailable, forwarding chunk unchanged");
                counter!("amberlink_store_errors_total").increment(1);
                summary.degraded_chunks += 1;
                return chunk;
            }
        };

        let outcome = BufferRewriter::new(&self.config, &self.zone)
            .rewrite(&matches, &chunk, session.as_mut(), Utc::now().timestamp())
            .await;

        if let Err(err) = session.close().await {
            warn!(error = %err, "failed to close cache store session");
        }

        summary.links_annotated += outcome.annotated();
        summary.links_enqueued += outcome.enqueued;
        if outcome.capacity_exhausted {
            summary.degraded_chunks += 1;
        }
        outcome.buffer
    }
}
