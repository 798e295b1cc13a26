//! Bookkeeping for requests that serve a previously captured copy.

use metrics::counter;
use tracing::{debug, error, info};

use crate::application::pipeline::RequestHead;
use crate::application::repos::{CacheStateStore, StoreError};

/// Cache identifier named by the last path segment of `uri`.
///
/// One trailing `/` is ignored. Query strings and fragments are not part of
/// the path. Returns `None` when there is no non-empty segment after a `/`.
pub fn cache_item_id(uri: &str) -> Option<&str> {
    let path = uri.split(['?', '#']).next().unwrap_or_default();
    let path = path.strip_suffix('/').unwrap_or(path);
    let (_, id) = path.rsplit_once('/')?;
    (!id.is_empty()).then_some(id)
}

/// Count the view and apply the stored content type to `head`.
///
/// Failures are logged and otherwise ignored; the cached copy is served either way.
pub async fn record_delivery(store: &dyn CacheStateStore, head: &mut RequestHead, now: i64) {
    let Some(cache_id) = cache_item_id(&head.uri) else {
        debug!(uri = %head.uri, "no cache id in delivery uri");
        return;
    };
    let cache_id = cache_id.to_string();

    if let Err(err) = apply(store, head, &cache_id, now).await {
        error!(cache_id = %cache_id, error = %err, "cache delivery bookkeeping failed");
        counter!("amberlink_store_errors_total").increment(1);
    }
}

async fn apply(
    store: &dyn CacheStateStore,
    head: &mut RequestHead,
    cache_id: &str,
    now: i64,
) -> Result<(), StoreError> {
    let mut session = store.open().await?;

    match session.log_activity(cache_id, now).await {
        Ok(()) => {
            debug!(cache_id, "logged cache view");
            counter!("amberlink_cache_views_total").increment(1);
        }
        Err(err) => {
            error!(cache_id, error = %err, "failed to log cache view");
            counter!("amberlink_store_errors_total").increment(1);
        }
    }

    match session.content_type(cache_id).await {
        Ok(Some(content_type)) => {
            info!(cache_id, content_type = %content_type, "serving cached item with stored content type");
            head.content_type = Some(content_type);
        }
        Ok(None) => debug!(cache_id, "no content type recorded for cached item"),
        Err(err) => {
            error!(cache_id, error = %err, "failed to read cached content type");
            counter!("amberlink_store_errors_total").increment(1);
        }
    }

    session.close().await
}
