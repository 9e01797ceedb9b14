//! Property-based tests for ranged and full reads through the router

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bucket_proxy::proxy::range::ByteRange;
use bucket_proxy::proxy::types::{ObjectKey, ProxyConfig};
use bucket_proxy::proxy::ProxyService;
use bucket_proxy::store::{MemoryObjectStore, StoredObject};
use http_body_util::BodyExt;
use proptest::prelude::*;
use std::sync::Arc;
use tower::ServiceExt;

struct Reply {
    status: StatusCode,
    content_length: Option<String>,
    content_range: Option<String>,
    body: Vec<u8>,
}

fn router_for(data: &[u8], chunk_size: usize) -> Router {
    let store = MemoryObjectStore::builder()
        .chunk_size(chunk_size)
        .object(
            ObjectKey::try_new("blob.bin").unwrap(),
            StoredObject::new(data.to_vec()),
        )
        .build();
    ProxyService::new(ProxyConfig::default(), Arc::new(store)).into_router()
}

fn fetch(router: Router, range: Option<String>) -> Reply {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async move {
        let mut request = Request::builder().method("GET").uri("/blob.bin");
        if let Some(range) = range {
            request = request.header("range", range);
        }
        let response = router
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .map(|v| v.to_str().unwrap().to_string())
        };
        let status = response.status();
        let content_length = header("content-length");
        let content_range = header("content-range");
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();

        Reply {
            status,
            content_length,
            content_range,
            body,
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn full_read_returns_whole_object(
        data in proptest::collection::vec(any::<u8>(), 0..2048),
        chunk_size in 1usize..512,
    ) {
        let reply = fetch(router_for(&data, chunk_size), None);

        prop_assert_eq!(reply.status, StatusCode::OK);
        prop_assert_eq!(reply.content_length, Some(data.len().to_string()));
        prop_assert!(reply.content_range.is_none());
        prop_assert_eq!(reply.body, data);
    }

    #[test]
    fn bounded_range_returns_matching_slice(
        (data, start, end) in proptest::collection::vec(any::<u8>(), 1..2048)
            .prop_flat_map(|data| {
                let len = data.len();
                (Just(data), 0..len)
            })
            .prop_flat_map(|(data, start)| {
                let len = data.len();
                (Just(data), Just(start), start..len)
            }),
        chunk_size in 1usize..512,
    ) {
        let total = data.len();
        let reply = fetch(router_for(&data, chunk_size), Some(format!("bytes={start}-{end}")));

        prop_assert_eq!(reply.status, StatusCode::PARTIAL_CONTENT);
        prop_assert_eq!(reply.content_length, Some((end - start + 1).to_string()));
        prop_assert_eq!(reply.content_range, Some(format!("bytes {start}-{end}/{total}")));
        prop_assert_eq!(&reply.body[..], &data[start..=end]);
    }

    #[test]
    fn range_starting_past_end_is_unsatisfiable(
        data in proptest::collection::vec(any::<u8>(), 0..256),
        overshoot in 0u64..1024,
    ) {
        let start = data.len() as u64 + overshoot;
        let reply = fetch(router_for(&data, 64), Some(format!("bytes={start}-")));
        prop_assert_eq!(reply.status, StatusCode::RANGE_NOT_SATISFIABLE);
    }

    #[test]
    fn resolved_range_stays_inside_object(
        range in prop_oneof![
            (0u64..4096, 0u64..4096)
                .prop_filter("start <= end", |(s, e)| s <= e)
                .prop_map(|(start, end)| ByteRange::Bounded { start, end }),
            (0u64..4096).prop_map(|start| ByteRange::From { start }),
            (1u64..4096).prop_map(|length| ByteRange::Suffix { length }),
        ],
        total in 0u64..4096,
    ) {
        match range.resolve(total) {
            Some(resolved) => {
                prop_assert!(resolved.start <= resolved.end);
                prop_assert!(resolved.end < total);
                prop_assert_eq!(resolved.total, total);
                prop_assert_eq!(resolved.length(), resolved.end - resolved.start + 1);
            }
            None => {
                let start = match range {
                    ByteRange::Bounded { start, .. } | ByteRange::From { start } => start,
                    ByteRange::Suffix { .. } => 0,
                };
                prop_assert!(total == 0 || start >= total);
            }
        }
    }
}
