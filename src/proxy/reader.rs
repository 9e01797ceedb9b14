//! Object reader: executes a read intent against the configured store

use crate::proxy::types::*;
use crate::store::{ObjectStore, ReadOutcome};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Adapter between the request path and an [`ObjectStore`]
///
/// Bounds how long the store may take to answer and normalizes what it
/// returns, so the relay can trust `content_range` to mean "partial".
#[derive(Clone)]
pub struct ObjectReader {
    store: Arc<dyn ObjectStore>,
    request_timeout: Duration,
}

impl ObjectReader {
    pub fn new(store: Arc<dyn ObjectStore>, request_timeout: Duration) -> Self {
        Self {
            store,
            request_timeout,
        }
    }

    /// Read the object described by `intent`
    ///
    /// Issues exactly one store read. The body is not consumed here.
    pub async fn read(&self, intent: &ReadIntent) -> ProxyResult<ReadOutcome> {
        let start = Instant::now();
        let key = &intent.object_key;

        let outcome = tokio::time::timeout(self.request_timeout, self.store.read(intent))
            .await
            .map_err(|_| {
                warn!(
                    key = %key,
                    store = self.store.name(),
                    timeout = ?self.request_timeout,
                    "Object store did not answer in time"
                );
                ProxyError::Upstream(format!(
                    "object store did not answer within {:?}",
                    self.request_timeout
                ))
            })??;

        let outcome = match outcome {
            ReadOutcome::Object(mut object) => {
                match (intent.range, object.content_range) {
                    (None, Some(_)) => {
                        debug!(key = %key, "Dropping Content-Range on a whole-object read");
                        object.content_range = None;
                    }
                    (Some(_), Some(range)) => object.content_length = Some(range.length()),
                    (Some(_), None) => {
                        debug!(key = %key, "Store ignored the range; serving whole object");
                    }
                    (None, None) => {}
                }
                ReadOutcome::Object(object)
            }
            not_modified => not_modified,
        };

        debug!(
            key = %key,
            store = self.store.name(),
            elapsed_ms = start.elapsed().as_millis(),
            "Object store answered"
        );
        Ok(outcome)
    }
}
