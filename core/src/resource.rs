//! JSON:API value types: resources, relationships, error objects and the
//! top-level document.
//!
//! # Design
//! A `Resource` cannot exist with an empty `type` or empty `attributes`.
//! Both `Resource::new` and deserialization go through the same check, so a
//! client-supplied document is held to the same contract as a resource a
//! controller builds.
//!
//! `Document` makes `data` and `errors` mutually exclusive by being an enum:
//! it serializes as either `{"data": ...}` or `{"errors": [...]}`.

use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::HttpError;

pub type Attributes = Map<String, Value>;
pub type Links = BTreeMap<String, String>;

/// Bytes escaped in a path segment: the URL path set plus `/` and `%`, so a
/// segment always decodes back to the exact type or id.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// `{"type": ..., "id": ...}` pointer to another resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

impl ResourceIdentifier {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

/// Linkage of a relationship: to-many is an array, to-one an object or null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipData {
    Many(Vec<ResourceIdentifier>),
    One(Option<ResourceIdentifier>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub data: RelationshipData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

impl Relationship {
    pub fn to_one(target: ResourceIdentifier) -> Self {
        Self {
            data: RelationshipData::One(Some(target)),
            links: None,
        }
    }

    pub fn to_many(targets: Vec<ResourceIdentifier>) -> Self {
        Self {
            data: RelationshipData::Many(targets),
            links: None,
        }
    }
}

/// A JSON:API resource object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawResource")]
pub struct Resource {
    #[serde(rename = "type")]
    resource_type: String,
    id: Option<String>,
    attributes: Attributes,
    relationships: BTreeMap<String, Relationship>,
    #[serde(skip_serializing_if = "Option::is_none")]
    links: Option<Links>,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<Value>,
}

/// Unchecked wire shape; converted through `Resource::new`'s rules.
#[derive(Deserialize)]
struct RawResource {
    #[serde(rename = "type", default)]
    resource_type: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    attributes: Attributes,
    #[serde(default)]
    relationships: BTreeMap<String, Relationship>,
    #[serde(default)]
    links: Option<Links>,
    #[serde(default)]
    meta: Option<Value>,
}

impl TryFrom<RawResource> for Resource {
    type Error = HttpError;

    fn try_from(raw: RawResource) -> Result<Self, Self::Error> {
        let mut resource = Resource::new(raw.resource_type, raw.attributes)?;
        resource.id = raw.id;
        resource.relationships = raw.relationships;
        resource.links = raw.links;
        resource.meta = raw.meta;
        Ok(resource)
    }
}

/// Request document carrying a single resource under `data`.
#[derive(Deserialize)]
struct SingleResourceDocument {
    data: Resource,
}

impl Resource {
    /// Fails with `ValidationError` when `resource_type` or `attributes` is
    /// empty.
    pub fn new(resource_type: impl Into<String>, attributes: Attributes) -> Result<Self, HttpError> {
        let resource_type = resource_type.into();
        if resource_type.is_empty() {
            return Err(HttpError::ValidationError("resource type must not be empty".into()));
        }
        if attributes.is_empty() {
            return Err(HttpError::ValidationError(format!(
                "resource of type '{resource_type}' must have at least one attribute"
            )));
        }
        Ok(Self {
            resource_type,
            id: None,
            attributes,
            relationships: BTreeMap::new(),
            links: None,
            meta: None,
        })
    }

    /// Read the resource out of a `{"data": {...}}` request body.
    ///
    /// Malformed JSON is a `BadRequest`; well-formed JSON that does not
    /// describe a valid resource is a `ValidationError`.
    pub fn from_document(body: &str) -> Result<Self, HttpError> {
        serde_json::from_str::<SingleResourceDocument>(body)
            .map(|doc| doc.data)
            .map_err(|e| match e.classify() {
                serde_json::error::Category::Data => HttpError::ValidationError(e.to_string()),
                _ => HttpError::BadRequest(format!("malformed JSON:API document: {e}")),
            })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_relationship(mut self, name: impl Into<String>, relationship: Relationship) -> Self {
        self.relationships.insert(name.into(), relationship);
        self
    }

    pub fn with_links(mut self, links: Links) -> Self {
        self.links = Some(links);
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn relationships(&self) -> &BTreeMap<String, Relationship> {
        &self.relationships
    }

    pub fn links(&self) -> Option<&Links> {
        self.links.as_ref()
    }

    pub fn meta(&self) -> Option<&Value> {
        self.meta.as_ref()
    }

    /// Path of this resource relative to the API base: `/type/id`, or
    /// `/type` when it has no id yet. Both segments are percent-encoded.
    pub fn uri(&self) -> String {
        let resource_type = utf8_percent_encode(&self.resource_type, SEGMENT);
        match &self.id {
            Some(id) => format!("/{resource_type}/{}", utf8_percent_encode(id, SEGMENT)),
            None => format!("/{resource_type}"),
        }
    }

    pub fn identifier(&self) -> Option<ResourceIdentifier> {
        self.id
            .as_ref()
            .map(|id| ResourceIdentifier::new(self.resource_type.clone(), id.clone()))
    }
}

/// One entry of an `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub detail: String,
}

/// Primary data of a successful response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PrimaryData {
    One(Resource),
    Many(Vec<Resource>),
    /// Rendered as `"data": null`, e.g. after a delete.
    Empty,
}

impl From<Resource> for PrimaryData {
    fn from(resource: Resource) -> Self {
        PrimaryData::One(resource)
    }
}

impl From<Vec<Resource>> for PrimaryData {
    fn from(resources: Vec<Resource>) -> Self {
        PrimaryData::Many(resources)
    }
}

/// Top-level JSON:API document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Document {
    #[serde(rename = "data")]
    Data(PrimaryData),
    #[serde(rename = "errors")]
    Errors(Vec<ErrorObject>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_attributes_are_rejected() {
        let err = Resource::new("widgets", Attributes::new()).unwrap_err();
        assert!(matches!(err, HttpError::ValidationError(_)));
    }

    #[test]
    fn empty_type_is_rejected() {
        let err = Resource::new("", attrs(json!({"name": "x"}))).unwrap_err();
        assert!(matches!(err, HttpError::ValidationError(_)));
    }

    #[test]
    fn resource_serializes_to_json_api_shape() {
        let resource = Resource::new("widgets", attrs(json!({"name": "sprocket"})))
            .unwrap()
            .with_id("42")
            .with_relationship("maker", Relationship::to_one(ResourceIdentifier::new("makers", "7")));

        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "widgets",
                "id": "42",
                "attributes": {"name": "sprocket"},
                "relationships": {"maker": {"data": {"type": "makers", "id": "7"}}}
            })
        );
    }

    #[test]
    fn new_resource_serializes_null_id() {
        let resource = Resource::new("widgets", attrs(json!({"name": "x"}))).unwrap();
        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["id"], Value::Null);
        assert_eq!(json["relationships"], json!({}));
        assert!(json.get("meta").is_none());
    }

    #[test]
    fn uri_with_and_without_id() {
        let resource = Resource::new("widgets", attrs(json!({"a": 1}))).unwrap();
        assert_eq!(resource.uri(), "/widgets");
        assert_eq!(resource.with_id("9").uri(), "/widgets/9");
    }

    #[test]
    fn uri_escapes_segments() {
        let resource = Resource::new("odd widgets", attrs(json!({"a": 1})))
            .unwrap()
            .with_id("a b/c%d?\u{e9}");
        assert_eq!(resource.uri(), "/odd%20widgets/a%20b%2Fc%25d%3F%C3%A9");
    }

    #[test]
    fn from_document_reads_data() {
        let body = r#"{"data":{"type":"widgets","attributes":{"name":"gear"},
            "relationships":{"parts":{"data":[{"type":"parts","id":"1"}]}}}}"#;
        let resource = Resource::from_document(body).unwrap();
        assert_eq!(resource.resource_type(), "widgets");
        assert_eq!(resource.id(), None);
        assert_eq!(resource.attribute("name"), Some(&json!("gear")));
        assert_eq!(
            resource.relationships()["parts"].data,
            RelationshipData::Many(vec![ResourceIdentifier::new("parts", "1")])
        );
    }

    #[test]
    fn from_document_validates_contract() {
        let err = Resource::from_document(r#"{"data":{"type":"widgets","attributes":{}}}"#).unwrap_err();
        assert!(matches!(err, HttpError::ValidationError(_)));

        let err = Resource::from_document(r#"{"data":{"attributes":{"a":1}}}"#).unwrap_err();
        assert!(matches!(err, HttpError::ValidationError(_)));
    }

    #[test]
    fn from_document_rejects_malformed_json() {
        let err = Resource::from_document("{not json").unwrap_err();
        assert!(matches!(err, HttpError::BadRequest(_)));
    }

    #[test]
    fn documents_are_data_or_errors() {
        let errors = Document::Errors(vec![ErrorObject {
            status: 404,
            title: None,
            detail: "gone".into(),
        }]);
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({"errors": [{"status": 404, "detail": "gone"}]})
        );

        let empty = Document::Data(PrimaryData::Empty);
        assert_eq!(serde_json::to_value(&empty).unwrap(), json!({"data": null}));
    }
}
