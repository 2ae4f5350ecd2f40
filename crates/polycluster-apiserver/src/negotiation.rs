//! Content negotiation and response writing.
//!
//! [`JsonSerializer`] is the default wire format.  [`StripVersionSerializer`]
//! wraps any serializer and drops `apiVersion` from the objects it writes;
//! the legacy `/api` discovery family is served through it.

use crate::error::ApiServerError;
use axum::{
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use polycluster_kernel::apis::{ApiError, Encoded, Object, Serializer};
use serde::Serialize;
use std::sync::Arc;

const APPLICATION_JSON: &str = "application/json";

/// JSON serializer honouring the `Accept` header.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: indent the output.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Serializer for JsonSerializer {
    fn supported_media_types(&self) -> &[&'static str] {
        &[APPLICATION_JSON]
    }

    fn encode(&self, object: &Object, accept: Option<&str>) -> Result<Encoded, ApiError> {
        let Some(content_type) = negotiate(accept, self.supported_media_types()) else {
            return Err(ApiError::NotAcceptable {
                supported: self.supported_media_types().join(", "),
            });
        };
        let value = object.clone().into_value();
        let body = if self.pretty {
            serde_json::to_vec_pretty(&value)?
        } else {
            serde_json::to_vec(&value)?
        };
        Ok(Encoded {
            content_type: content_type.to_string(),
            body,
        })
    }
}

/// Serializer wrapper that removes `apiVersion` before delegating.
#[derive(Clone)]
pub struct StripVersionSerializer {
    inner: Arc<dyn Serializer>,
}

impl StripVersionSerializer {
    pub fn new(inner: Arc<dyn Serializer>) -> Self {
        Self { inner }
    }
}

impl Serializer for StripVersionSerializer {
    fn supported_media_types(&self) -> &[&'static str] {
        self.inner.supported_media_types()
    }

    fn encode(&self, object: &Object, accept: Option<&str>) -> Result<Encoded, ApiError> {
        let mut stripped = object.clone();
        stripped.type_meta.api_version.clear();
        self.inner.encode(&stripped, accept)
    }
}

/// Pick the first supported media type matched by `accept`.
///
/// A missing or empty header accepts anything.  Media-type parameters
/// (`;as=Table;g=meta.k8s.io`) do not take part in matching.
pub(crate) fn negotiate<'a>(accept: Option<&str>, supported: &[&'a str]) -> Option<&'a str> {
    let accept = accept.map(str::trim).unwrap_or_default();
    if accept.is_empty() {
        return supported.first().copied();
    }

    for range in accept.split(',') {
        let media = range.split(';').next().unwrap_or_default().trim();
        if media == "*/*" {
            return supported.first().copied();
        }
        if let Some(kind) = media.strip_suffix("/*") {
            if let Some(found) = supported
                .iter()
                .copied()
                .find(|s| s.split('/').next() == Some(kind))
            {
                return Some(found);
            }
            continue;
        }
        if let Some(found) = supported.iter().copied().find(|s| *s == media) {
            return Some(found);
        }
    }
    None
}

/// Encode `object` for the caller and build the response.
pub fn write_object_negotiated(
    serializer: &dyn Serializer,
    status: StatusCode,
    object: &Object,
    headers: &HeaderMap,
) -> Response {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok());
    match serializer.encode(object, accept) {
        Ok(encoded) => (
            status,
            [(header::CONTENT_TYPE, encoded.content_type)],
            encoded.body,
        )
            .into_response(),
        Err(err) => ApiServerError::from(err).into_response(),
    }
}

/// Wrap `body` with the given type information and write it.
pub fn write_typed_negotiated<T: Serialize>(
    serializer: &dyn Serializer,
    status: StatusCode,
    kind: &str,
    api_version: &str,
    body: &T,
    headers: &HeaderMap,
) -> Response {
    match Object::new(kind, api_version, body) {
        Ok(object) => write_object_negotiated(serializer, status, &object, headers),
        Err(err) => ApiServerError::from(err).into_response(),
    }
}
