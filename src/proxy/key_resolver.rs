//! Object key resolution from request paths

use crate::proxy::types::*;
use hyper::Uri;

/// Strategy for turning a request URL path into a bucket-relative key
#[derive(Clone, Debug, Default)]
pub struct KeyResolver {
    prefix: RoutePrefix,
    index_document: Option<IndexDocument>,
}

impl KeyResolver {
    pub fn new(prefix: RoutePrefix, index_document: Option<IndexDocument>) -> Self {
        Self {
            prefix,
            index_document,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(config.route_prefix.clone(), config.index_document.clone())
    }

    /// Resolve the object key named by a request URI
    ///
    /// The query string is ignored. The path is matched against the route
    /// prefix on segment boundaries, then percent-decoded.
    pub fn resolve(&self, uri: &Uri) -> ProxyResult<ObjectKey> {
        let path = uri.path();
        let remainder = self.strip_prefix(path)?;

        let decoded = urlencoding::decode(remainder).map_err(|e| {
            ProxyError::BadRequest(format!("Invalid percent-encoding in '{path}': {e}"))
        })?;

        let key = match &self.index_document {
            Some(index) if decoded.is_empty() || decoded.ends_with('/') => {
                format!("{decoded}{index}")
            }
            _ => decoded.into_owned(),
        };

        ObjectKey::try_new(key)
            .map_err(|_| ProxyError::BadRequest(format!("No object named by path '{path}'")))
    }

    fn strip_prefix<'a>(&self, path: &'a str) -> ProxyResult<&'a str> {
        let remainder = path
            .strip_prefix(self.prefix.as_ref())
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .ok_or_else(|| {
                ProxyError::NotFound(format!("Path '{path}' is outside the proxied prefix"))
            })?;

        Ok(remainder.strip_prefix('/').unwrap_or(remainder))
    }
}
