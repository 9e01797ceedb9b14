//! Request interpretation: inbound GET request to `ReadIntent`

use crate::proxy::headers::{IF_NONE_MATCH, RANGE};
use crate::proxy::key_resolver::KeyResolver;
use crate::proxy::range::ByteRange;
use crate::proxy::types::*;
use http::{HeaderMap, Uri};

/// Parses requests into read intents; has no side effects
#[derive(Clone, Debug, Default)]
pub struct RequestInterpreter {
    resolver: KeyResolver,
}

impl RequestInterpreter {
    pub fn new(resolver: KeyResolver) -> Self {
        Self { resolver }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(KeyResolver::from_config(config))
    }

    /// Build the read intent for a GET request
    pub fn interpret(&self, uri: &Uri, headers: &HeaderMap) -> ProxyResult<ReadIntent> {
        let object_key = self.resolver.resolve(uri)?;
        let range = parse_range(headers)?;
        let if_none_match = parse_if_none_match(headers)?;

        Ok(ReadIntent {
            object_key,
            range,
            if_none_match,
        })
    }
}

fn parse_range(headers: &HeaderMap) -> ProxyResult<Option<ByteRange>> {
    let mut values = headers.get_all(RANGE).iter();
    let Some(value) = values.next() else {
        return Ok(None);
    };
    if values.next().is_some() {
        return Err(ProxyError::InvalidRange(
            "multiple Range headers are not supported".to_string(),
        ));
    }

    let value = value
        .to_str()
        .map_err(|_| ProxyError::InvalidRange("Range header is not ASCII".to_string()))?;
    ByteRange::parse(value).map(Some)
}

/// Joins repeated `If-None-Match` lines into one list, otherwise verbatim
fn parse_if_none_match(headers: &HeaderMap) -> ProxyResult<Option<ETag>> {
    let values = headers
        .get_all(IF_NONE_MATCH)
        .iter()
        .map(|value| {
            value.to_str().map(str::trim).map_err(|_| {
                ProxyError::BadRequest("If-None-Match header is not ASCII".to_string())
            })
        })
        .collect::<ProxyResult<Vec<_>>>()?;

    let joined = values
        .into_iter()
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    Ok(ETag::try_new(joined).ok())
}
