//! In-process object store
//!
//! Objects are fixed at build time, so reads need no locking. Bodies are
//! streamed as zero-copy slices of the stored bytes, one chunk at a time.

use crate::proxy::range::ContentRange;
use crate::proxy::types::{ETag, ObjectKey, ReadIntent, DEFAULT_STREAM_BUFFER_SIZE};
use crate::store::{ObjectBody, ObjectReadResult, ObjectStore, ReadOutcome, StoreError, StoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// One object held by [`MemoryObjectStore`]
#[derive(Clone, Debug)]
pub struct StoredObject {
    data: Bytes,
    etag: ETag,
    content_type: Option<String>,
    last_modified: Option<String>,
    cache_control: Option<String>,
    fail_after: Option<usize>,
}

impl StoredObject {
    /// Object with an ETag derived from its content
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let etag = content_etag(&data);
        Self {
            data,
            etag,
            content_type: None,
            last_modified: None,
            cache_control: None,
            fail_after: None,
        }
    }

    pub fn with_etag(mut self, etag: ETag) -> Self {
        self.etag = etag;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_last_modified(mut self, http_date: impl Into<String>) -> Self {
        self.last_modified = Some(http_date.into());
        self
    }

    pub fn with_cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = Some(cache_control.into());
        self
    }

    /// Make every read of this object fail after `bytes` body bytes
    pub fn failing_after(mut self, bytes: usize) -> Self {
        self.fail_after = Some(bytes);
        self
    }

    pub fn etag(&self) -> &ETag {
        &self.etag
    }
}

/// Failure returned for a key before any object lookup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InjectedFailure {
    PermissionDenied,
    Upstream,
}

/// Immutable in-memory bucket
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: HashMap<ObjectKey, StoredObject>,
    failures: HashMap<ObjectKey, InjectedFailure>,
    chunk_size: usize,
    reads: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn builder() -> MemoryObjectStoreBuilder {
        MemoryObjectStoreBuilder::default()
    }

    /// Number of `read` calls served so far
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    fn body(&self, object: &StoredObject, span: Option<ContentRange>) -> ObjectBody {
        let (start, end) = match span {
            Some(range) => (to_index(range.start), to_index(range.end) + 1),
            None => (0, object.data.len()),
        };
        let cutoff = object.fail_after.map(|bytes| start.saturating_add(bytes));

        let state = ChunkCursor {
            data: object.data.clone(),
            position: start,
            end,
            chunk_size: self.chunk_size,
            cutoff,
        };

        Box::pin(stream::unfold(state, |mut cursor| async move {
            let chunk = cursor.next_chunk()?;
            Some((chunk, cursor))
        }))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, intent: &ReadIntent) -> StoreResult<ReadOutcome> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let key = &intent.object_key;

        match self.failures.get(key) {
            Some(InjectedFailure::PermissionDenied) => {
                return Err(StoreError::PermissionDenied {
                    key: key.clone(),
                    detail: "injected".to_string(),
                })
            }
            Some(InjectedFailure::Upstream) => {
                return Err(StoreError::Upstream(format!("injected failure reading '{key}'")))
            }
            None => {}
        }

        let object = self
            .objects
            .get(key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;

        if let Some(if_none_match) = &intent.if_none_match {
            if object.etag.is_selected_by(if_none_match) {
                debug!(key = %key, "Conditional read matched current version");
                return Ok(ReadOutcome::NotModified {
                    etag: Some(object.etag.clone()),
                });
            }
        }

        let total = object.data.len() as u64;
        let content_range = match intent.range {
            Some(range) => Some(
                range
                    .resolve(total)
                    .ok_or_else(|| StoreError::InvalidRange { key: key.clone() })?,
            ),
            None => None,
        };
        let content_length = content_range.map_or(total, |range| range.length());

        Ok(ReadOutcome::Object(ObjectReadResult {
            content_length: Some(content_length),
            content_range,
            etag: Some(object.etag.clone()),
            content_type: object.content_type.clone(),
            last_modified: object.last_modified.clone(),
            cache_control: object.cache_control.clone(),
            body: self.body(object, content_range),
        }))
    }
}

/// Builder for [`MemoryObjectStore`]
#[derive(Debug)]
pub struct MemoryObjectStoreBuilder {
    objects: HashMap<ObjectKey, StoredObject>,
    failures: HashMap<ObjectKey, InjectedFailure>,
    chunk_size: usize,
}

impl Default for MemoryObjectStoreBuilder {
    fn default() -> Self {
        Self {
            objects: HashMap::new(),
            failures: HashMap::new(),
            chunk_size: DEFAULT_STREAM_BUFFER_SIZE,
        }
    }
}

impl MemoryObjectStoreBuilder {
    pub fn object(mut self, key: ObjectKey, object: StoredObject) -> Self {
        self.objects.insert(key, object);
        self
    }

    pub fn failure(mut self, key: ObjectKey, failure: InjectedFailure) -> Self {
        self.failures.insert(key, failure);
        self
    }

    /// Size of each streamed body chunk; zero is treated as one
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn build(self) -> MemoryObjectStore {
        MemoryObjectStore {
            objects: self.objects,
            failures: self.failures,
            chunk_size: self.chunk_size,
            reads: AtomicUsize::new(0),
        }
    }
}

struct ChunkCursor {
    data: Bytes,
    position: usize,
    end: usize,
    chunk_size: usize,
    cutoff: Option<usize>,
}

impl ChunkCursor {
    fn next_chunk(&mut self) -> Option<std::io::Result<Bytes>> {
        if self.position >= self.end {
            return None;
        }
        if let Some(cutoff) = self.cutoff.filter(|cutoff| self.position >= *cutoff) {
            self.position = self.end;
            return Some(Err(std::io::Error::other(format!(
                "injected read failure at byte {cutoff}"
            ))));
        }

        let limit = self.cutoff.map_or(self.end, |cutoff| cutoff.min(self.end));
        let next = limit.min(self.position.saturating_add(self.chunk_size));
        let chunk = self.data.slice(self.position..next);
        self.position = next;
        Some(Ok(chunk))
    }
}

fn to_index(offset: u64) -> usize {
    usize::try_from(offset).unwrap_or(usize::MAX)
}

/// Quoted hex digest, shaped like the ETags real stores hand out
fn content_etag(data: &[u8]) -> ETag {
    let digest = Sha256::digest(data);
    ETag::try_new(format!("\"{}\"", hex::encode(&digest[..16])))
        .expect("quoted digest is never empty")
}
