//! S3-compatible object store backed by `aws-sdk-s3`

use crate::config::{BucketName, StorageSettings};
use crate::error::Error;
use crate::proxy::range::ContentRange;
use crate::proxy::types::{ETag, ObjectKey, ReadIntent, StreamBufferSize};
use crate::store::{ObjectReadResult, ObjectStore, ReadOutcome, StoreError, StoreResult};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::{GetObjectError, GetObjectOutput};
use aws_sdk_s3::primitives::DateTimeFormat;
use aws_sdk_s3::Client;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// Object store reading from a single S3 bucket
#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: Client,
    bucket: BucketName,
    buffer_size: StreamBufferSize,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: BucketName, buffer_size: StreamBufferSize) -> Self {
        Self {
            client,
            bucket,
            buffer_size,
        }
    }

    /// Build a client from the ambient AWS configuration plus the storage settings
    ///
    /// Fails when no region can be determined; the proxy cannot address the
    /// bucket without one.
    pub async fn from_settings(
        settings: &StorageSettings,
        buffer_size: StreamBufferSize,
    ) -> Result<Self, Error> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let region = sdk_config.region().cloned().ok_or_else(|| {
            Error::Store("no AWS region configured; set storage.region or AWS_REGION".to_string())
        })?;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .region(region.clone())
            .force_path_style(settings.force_path_style);
        if let Some(endpoint) = &settings.endpoint_url {
            builder = builder.endpoint_url(endpoint.as_ref());
        }

        info!(
            bucket = %settings.bucket,
            region = %region,
            endpoint = ?settings.endpoint_url,
            "Initialized S3 object store"
        );

        Ok(Self::new(
            Client::from_conf(builder.build()),
            settings.bucket.clone(),
            buffer_size,
        ))
    }

    fn convert_output(&self, key: &ObjectKey, output: GetObjectOutput) -> StoreResult<ReadOutcome> {
        let content_range = match output.content_range() {
            Some(raw) => Some(ContentRange::parse(raw).ok_or_else(|| {
                StoreError::Upstream(format!(
                    "store returned malformed Content-Range '{raw}' for '{key}'"
                ))
            })?),
            None => None,
        };

        let content_length = output
            .content_length()
            .and_then(|length| u64::try_from(length).ok());
        let etag = output.e_tag().and_then(|tag| ETag::try_new(tag).ok());
        let content_type = output.content_type().map(str::to_string);
        let cache_control = output.cache_control().map(str::to_string);
        let last_modified = output
            .last_modified()
            .and_then(|date| date.fmt(DateTimeFormat::HttpDate).ok());

        let reader = output.body.into_async_read();
        let body = ReaderStream::with_capacity(reader, *self.buffer_size.as_ref());

        Ok(ReadOutcome::Object(ObjectReadResult {
            content_length,
            content_range,
            etag,
            content_type,
            last_modified,
            cache_control,
            body: Box::pin(body),
        }))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn read(&self, intent: &ReadIntent) -> StoreResult<ReadOutcome> {
        let key = &intent.object_key;
        let request = self
            .client
            .get_object()
            .bucket(self.bucket.as_ref())
            .key(key.as_ref())
            .set_range(intent.range.map(|range| range.to_string()))
            .set_if_none_match(intent.if_none_match.as_ref().map(|tag| tag.as_ref().to_string()));

        debug!(bucket = %self.bucket, key = %key, range = ?intent.range, "GetObject");

        match request.send().await {
            Ok(output) => self.convert_output(key, output),
            Err(err) => classify_error(key, err),
        }
    }
}

/// Map a failed `GetObject` call onto the store error categories
///
/// A 304 arrives as an error from the SDK; it is the conditional-read hit.
fn classify_error(
    key: &ObjectKey,
    err: SdkError<GetObjectError, aws_sdk_s3::config::http::HttpResponse>,
) -> StoreResult<ReadOutcome> {
    let status = err.raw_response().map(|raw| raw.status().as_u16());

    match status {
        Some(304) => {
            let etag = err
                .raw_response()
                .and_then(|raw| raw.headers().get("etag"))
                .and_then(|tag| ETag::try_new(tag).ok());
            Ok(ReadOutcome::NotModified { etag })
        }
        Some(404) => Err(StoreError::NotFound { key: key.clone() }),
        Some(403) => Err(StoreError::PermissionDenied {
            key: key.clone(),
            detail: error_code(&err).unwrap_or("AccessDenied").to_string(),
        }),
        Some(416) => Err(StoreError::InvalidRange { key: key.clone() }),
        _ => {
            warn!(
                key = %key,
                status = ?status,
                error = %DisplayErrorContext(&err),
                "GetObject failed"
            );
            Err(StoreError::Upstream(format!(
                "reading '{key}' failed: {}",
                DisplayErrorContext(&err)
            )))
        }
    }
}

fn error_code<R>(err: &SdkError<GetObjectError, R>) -> Option<&str> {
    use aws_sdk_s3::error::ProvideErrorMetadata;
    err.as_service_error().and_then(ProvideErrorMetadata::code)
}
