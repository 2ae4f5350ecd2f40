//! Typed objects and the serializer capability.
//!
//! Everything the API server writes to the wire goes through a
//! [`Serializer`].  Discovery documents, storage objects, tables and
//! `Status` errors are all wrapped in an [`Object`] that carries its
//! [`TypeMeta`] next to the JSON content, so serializers can rewrite the
//! type information (e.g. strip `apiVersion`) without knowing the body.

use super::error::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `kind` / `apiVersion` header of a wire object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
}

impl TypeMeta {
    pub fn new(kind: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            api_version: api_version.into(),
        }
    }
}

/// A JSON body plus its type information.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub type_meta: TypeMeta,
    pub content: Value,
}

impl Object {
    /// Wrap any serializable body.
    pub fn new<T: Serialize>(
        kind: impl Into<String>,
        api_version: impl Into<String>,
        body: &T,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            type_meta: TypeMeta::new(kind, api_version),
            content: serde_json::to_value(body)?,
        })
    }

    /// Wrap a raw object that already carries `kind`/`apiVersion` fields.
    pub fn from_value(content: Value) -> Self {
        let field = |name: &str| {
            content
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let type_meta = TypeMeta::new(field("kind"), field("apiVersion"));
        Self { type_meta, content }
    }

    /// Merge the type information into the body.
    ///
    /// Fields already present in the body are overwritten; an empty
    /// `apiVersion` removes the field.  Non-object bodies are returned as is.
    pub fn into_value(self) -> Value {
        let Object { type_meta, content } = self;
        match content {
            Value::Object(mut map) => {
                if type_meta.kind.is_empty() {
                    map.remove("kind");
                } else {
                    map.insert("kind".to_string(), Value::String(type_meta.kind));
                }
                if type_meta.api_version.is_empty() {
                    map.remove("apiVersion");
                } else {
                    map.insert("apiVersion".to_string(), Value::String(type_meta.api_version));
                }
                Value::Object(map)
            }
            other => other,
        }
    }
}

/// Annotation naming the cluster an aggregated object was collected from.
pub const SHADOW_ANNOTATION_CLUSTER_NAME: &str = "shadow.polycluster.io/cluster-name";

/// The originating cluster of an object, or `""` when it carries none.
pub fn extract_cluster_name(object: &Value) -> &str {
    object
        .pointer("/metadata/annotations")
        .and_then(|annotations| annotations.get(SHADOW_ANNOTATION_CLUSTER_NAME))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// Bytes produced by a [`Serializer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Wire-format capability.
///
/// `accept` is the raw `Accept` header of the request, if any.  A serializer
/// that cannot produce any acceptable media type returns
/// [`ApiError::NotAcceptable`].
pub trait Serializer: Send + Sync {
    /// Media types this serializer can produce, most preferred first.
    fn supported_media_types(&self) -> &[&'static str];

    fn encode(&self, object: &Object, accept: Option<&str>) -> Result<Encoded, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_reads_type_meta() {
        let obj = Object::from_value(json!({"kind": "Pod", "apiVersion": "v1", "metadata": {}}));
        assert_eq!(obj.type_meta, TypeMeta::new("Pod", "v1"));
    }

    #[test]
    fn into_value_overwrites_and_strips() {
        let mut obj = Object::from_value(json!({"kind": "Pod", "apiVersion": "v1"}));
        obj.type_meta.api_version.clear();
        let value = obj.into_value();
        assert_eq!(value, json!({"kind": "Pod"}));
    }

    #[test]
    fn cluster_name_comes_from_shadow_annotation() {
        let obj = json!({
            "metadata": {"annotations": {(SHADOW_ANNOTATION_CLUSTER_NAME): "east"}}
        });
        assert_eq!(extract_cluster_name(&obj), "east");
        assert_eq!(extract_cluster_name(&json!({"metadata": {}})), "");
        assert_eq!(extract_cluster_name(&json!("not an object")), "");
    }

    #[test]
    fn new_wraps_serializable_body() {
        let obj = Object::new("APIVersions", "", &json!({"versions": ["v1"]})).unwrap();
        assert_eq!(
            obj.into_value(),
            json!({"kind": "APIVersions", "versions": ["v1"]})
        );
    }
}
