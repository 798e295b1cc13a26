//! Rebuild a chunk with annotations inserted in front of matched links.
//!
//! The output buffer is allocated once, sized for the original bytes plus a
//! fixed reserve per match, and never grows past that. Original markup is
//! copied byte-for-byte; annotations are only ever inserted.

use std::fmt::Display;
use std::ops::Range;

use bytes::{Bytes, BytesMut};
use chrono::TimeZone;
use metrics::counter;
use tracing::{debug, error, warn};

use crate::application::annotation::{MAX_ATTRIBUTE_SIZE, render_annotation};
use crate::application::repos::CacheSession;
use crate::application::scanner::MatchSet;
use crate::domain::behavior::BehaviorConfig;
use crate::domain::entities::CacheLookup;

/// Result of rewriting one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub buffer: Bytes,
    /// Byte ranges of inserted annotations within `buffer`.
    pub insertions: Vec<Range<usize>>,
    pub enqueued: usize,
    pub capacity_exhausted: bool,
}

impl RewriteOutcome {
    fn unchanged(buffer: Bytes) -> Self {
        Self {
            buffer,
            insertions: Vec::new(),
            enqueued: 0,
            capacity_exhausted: false,
        }
    }

    pub fn annotated(&self) -> usize {
        self.insertions.len()
    }
}

pub struct BufferRewriter<'a, Tz: TimeZone> {
    config: &'a BehaviorConfig,
    zone: &'a Tz,
    attribute_reserve: usize,
}

impl<'a, Tz> BufferRewriter<'a, Tz>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    pub fn new(config: &'a BehaviorConfig, zone: &'a Tz) -> Self {
        Self {
            config,
            zone,
            attribute_reserve: MAX_ATTRIBUTE_SIZE,
        }
    }

    /// Override the per-match space reserved in the output buffer.
    pub fn with_attribute_reserve(mut self, reserve: usize) -> Self {
        self.attribute_reserve = reserve;
        self
    }

    /// Insert annotations for every match the store knows about and queue the
    /// URLs it has never seen. Store failures only cost the affected link its
    /// annotation.
    pub async fn rewrite(
        &self,
        matches: &MatchSet,
        old: &Bytes,
        session: &mut dyn CacheSession,
        now: i64,
    ) -> RewriteOutcome {
        if matches.is_empty() {
            return RewriteOutcome::unchanged(old.clone());
        }

        let capacity = old.len() + matches.len() * self.attribute_reserve;
        let mut dest = BytesMut::with_capacity(capacity);
        let mut insertions = Vec::new();
        let mut enqueued = 0;
        let mut capacity_exhausted = false;
        let mut src = 0;

        for link in matches {
            if link.offset < src || link.offset > old.len() {
                warn!(offset = link.offset, "match offset out of order, skipping");
                continue;
            }

            dest.extend_from_slice(&old[src..link.offset]);
            src = link.offset;

            match session.lookup_attributes(&link.url).await {
                Ok(CacheLookup::Found(record)) => {
                    let Some(attribute) = render_annotation(self.config, &record, self.zone) else {
                        debug!(url = %link.url, "no behavior configured for link state");
                        continue;
                    };

                    // The untouched tail must still fit after this insertion.
                    let pending = attribute.len() + (old.len() - src);
                    if dest.len() + pending > capacity {
                        warn!(
                            url = %link.url,
                            capacity,
                            written = dest.len(),
                            "annotation buffer exhausted, leaving remaining links unannotated"
                        );
                        counter!("amberlink_capacity_exhausted_total").increment(1);
                        capacity_exhausted = true;
                        break;
                    }

                    let start = dest.len();
                    dest.extend_from_slice(attribute.as_bytes());
                    insertions.push(start..dest.len());
                    counter!("amberlink_links_annotated_total").increment(1);
                }
                Ok(CacheLookup::NotFound) => {
                    match session.enqueue_for_caching(&link.url, now).await {
                        Ok(()) => {
                            debug!(url = %link.url, "queued for capture");
                            enqueued += 1;
                            counter!("amberlink_links_enqueued_total").increment(1);
                        }
                        Err(err) => {
                            error!(url = %link.url, error = %err, "failed to queue url");
                            counter!("amberlink_store_errors_total").increment(1);
                        }
                    }
                }
                Ok(CacheLookup::Empty) => {
                    debug!(url = %link.url, "checked but not captured yet");
                }
                Err(err) => {
                    error!(url = %link.url, error = %err, "cache lookup failed");
                    counter!("amberlink_store_errors_total").increment(1);
                }
            }
        }

        dest.extend_from_slice(&old[src..]);

        RewriteOutcome {
            buffer: dest.freeze(),
            insertions,
            enqueued,
            capacity_exhausted,
        }
    }
}
