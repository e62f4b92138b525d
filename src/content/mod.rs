//! Content documents
//!
//! A content document is an open, schemaless JSON object. Only a handful of
//! fields matter to the unroller and every access is fallible, so `Content`
//! wraps the raw object with explicit accessors instead of casts.

mod body;
mod identifier;
mod schema;

pub use body::embedded_refs;
pub use identifier::{build_id, extract_uuid};
pub use schema::Schema;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const IMAGE_SET_TYPE: &str = "http://www.ft.com/ontology/content/ImageSet";
pub const DYNAMIC_CONTENT_TYPE: &str = "http://www.ft.com/ontology/content/DynamicContent";
pub const CLIP_SET_TYPE: &str = "http://www.ft.com/ontology/content/ClipSet";
pub const CLIP_TYPE: &str = "http://www.ft.com/ontology/content/Clip";
pub const ARTICLE_TYPE: &str = "http://www.ft.com/ontology/content/Article";
pub const CUSTOM_CODE_COMPONENT_TYPE: &str =
    "http://www.ft.com/ontology/content/CustomCodeComponent";

pub(crate) const ID_FIELD: &str = "id";
pub(crate) const TYPE_FIELD: &str = "type";
pub(crate) const TYPES_FIELD: &str = "types";
pub(crate) const MAIN_IMAGE_FIELD: &str = "mainImage";
pub(crate) const ALT_IMAGES_FIELD: &str = "alternativeImages";
pub(crate) const PROMOTIONAL_IMAGE_FIELD: &str = "promotionalImage";
pub(crate) const LEAD_IMAGES_FIELD: &str = "leadImages";
pub(crate) const MEMBERS_FIELD: &str = "members";
pub(crate) const POSTER_FIELD: &str = "poster";
pub(crate) const BODY_XML_FIELD: &str = "bodyXML";
pub(crate) const EMBEDS_FIELD: &str = "embeds";
pub(crate) const FORMAT_FIELD: &str = "format";
pub(crate) const IMAGE_FIELD: &str = "image";
pub(crate) const API_URL_FIELD: &str = "apiUrl";

/// One unit of editorial content as an open JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Content(Map<String, Value>);

impl Content {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap a JSON value, failing when it is not an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn get_object(&self, field: &str) -> Option<&Map<String, Value>> {
        self.0.get(field).and_then(Value::as_object)
    }

    pub fn get_object_mut(&mut self, field: &str) -> Option<&mut Map<String, Value>> {
        self.0.get_mut(field).and_then(Value::as_object_mut)
    }

    pub fn get_array(&self, field: &str) -> Option<&Vec<Value>> {
        self.0.get(field).and_then(Value::as_array)
    }

    pub fn get_array_mut(&mut self, field: &str) -> Option<&mut Vec<Value>> {
        self.0.get_mut(field).and_then(Value::as_array_mut)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Copy all fields of `src` into this document, overwriting on collision.
    pub fn merge(&mut self, src: &Content) {
        for (k, v) in &src.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// The declared type used for dispatch. When a `types` sequence is
    /// present its first element wins, otherwise the single `type` field.
    pub fn primary_type(&self) -> Option<&str> {
        if let Some(types) = self.get_array(TYPES_FIELD) {
            return types.first().and_then(Value::as_str);
        }
        self.get_str(TYPE_FIELD)
    }

    /// Whether the document declares `wanted` among its types.
    pub fn is_type(&self, wanted: &str) -> bool {
        if let Some(types) = self.get_array(TYPES_FIELD) {
            return types.iter().any(|t| t.as_str() == Some(wanted));
        }
        self.get_str(TYPE_FIELD) == Some(wanted)
    }
}
