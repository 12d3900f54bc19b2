//! Data model shared by the ports, the reconciler and the profile service
//!
//! A remote collection holds [`Document`]s addressed by [`DocumentPath`].
//! The reconciler works on [`Item`]s, which are documents decoded into an
//! optional identity, a category and an opaque field map.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Opaque attribute map of a document or item
pub type Fields = serde_json::Map<String, Value>;

/// Field under which an item's category is persisted
pub const CATEGORY_FIELD: &str = "category";

/// Legacy boolean flag that marked social links before `category` existed
const LEGACY_SOCIAL_FLAG: &str = "isSocial";

/// Keys that belong to the item envelope, never to its fields
const RESERVED_FIELDS: [&str; 2] = ["id", CATEGORY_FIELD];

/// Identity of an item that exists remotely
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discriminator carried by every item (e.g. "social" or "custom")
///
/// The category is a field, not a partition key: reconciliation always runs
/// over the full flattened list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub const SOCIAL: &'static str = "social";
    pub const CUSTOM: &'static str = "custom";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn social() -> Self {
        Self::new(Self::SOCIAL)
    }

    pub fn custom() -> Self {
        Self::new(Self::CUSTOM)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One element of a reconciled collection (a link, in profile terms)
///
/// `id` is `None` for items that have not been created remotely yet.
/// Equality is structural over `id`, `category` and every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    #[serde(default = "Category::custom")]
    pub category: Category,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Item {
    /// Create a new, not yet persisted item
    pub fn new(category: Category) -> Self {
        Self {
            id: None,
            category,
            fields: Fields::new(),
        }
    }

    /// Set the remote identity
    pub fn with_id(mut self, id: impl Into<ItemId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set a field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Numeric `position` field, used for display ordering
    pub fn position(&self) -> Option<f64> {
        self.fields.get("position").and_then(Value::as_f64)
    }

    /// Strip envelope keys that leaked into `fields`
    ///
    /// Items decoded from documents never carry `id` or `category` inside
    /// their fields, so desired items are normalized the same way before
    /// they are compared.
    pub fn normalized(mut self) -> Self {
        for key in RESERVED_FIELDS {
            self.fields.remove(key);
        }
        self
    }

    /// Fields as they are written to the remote document
    pub fn to_document_fields(&self) -> Fields {
        let mut fields = self.fields.clone();
        for key in RESERVED_FIELDS {
            fields.remove(key);
        }
        fields.insert(
            CATEGORY_FIELD.to_string(),
            Value::String(self.category.as_str().to_string()),
        );
        fields
    }

    /// Decode a remote document into an item
    ///
    /// Documents written before `category` existed are classified by the
    /// legacy `isSocial` flag: `true` is social, anything else custom.
    pub fn from_document(document: Document) -> Self {
        let Document { id, mut fields } = document;
        fields.remove("id");
        let category = match fields.remove(CATEGORY_FIELD) {
            Some(Value::String(name)) => Category::new(name),
            _ => match fields.get(LEGACY_SOCIAL_FLAG) {
                Some(Value::Bool(true)) => Category::social(),
                _ => Category::custom(),
            },
        };
        Self {
            id: Some(ItemId::new(id)),
            category,
            fields,
        }
    }
}

/// A document as returned by the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Last path segment of the document
    pub id: String,
    #[serde(default)]
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Look up a top-level field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Slash-separated path of a collection, e.g. `teams/abc/links`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into().trim_matches('/').to_string())
    }

    /// Path of a document in this collection
    pub fn doc(&self, id: &str) -> DocumentPath {
        DocumentPath(format!("{}/{}", self.0, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Slash-separated path of a document, e.g. `teams/abc`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath(String);

impl DocumentPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into().trim_matches('/').to_string())
    }

    /// Path of a sub-collection of this document
    pub fn collection(&self, name: &str) -> CollectionPath {
        CollectionPath(format!("{}/{}", self.0, name))
    }

    /// Last path segment
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Collection that contains this document
    pub fn parent(&self) -> CollectionPath {
        match self.0.rsplit_once('/') {
            Some((parent, _)) => CollectionPath(parent.to_string()),
            None => CollectionPath(String::new()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Predicate for collection queries
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every document in the collection
    All,
    /// Documents whose top-level `field` equals `value`
    FieldEquals { field: String, value: Value },
}

impl Filter {
    pub fn field_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Evaluate the predicate against a field map
    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Filter::All => true,
            Filter::FieldEquals { field, value } => fields.get(field) == Some(value),
        }
    }
}

/// How `DocumentStore::set` combines new fields with an existing document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Overwrite the whole document
    Replace,
    /// Overwrite only the given top-level fields, keep the rest
    Merge,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn document_round_trip_preserves_category() {
        let item = Item::new(Category::social())
            .with_id("a")
            .with_field("platform", "x")
            .with_field("position", 0);

        let decoded = Item::from_document(Document::new("a", item.to_document_fields()));
        assert_eq!(decoded, item);
    }

    #[test]
    fn legacy_documents_are_classified_by_social_flag() {
        let social = Item::from_document(Document::new(
            "s",
            fields(json!({"isSocial": true, "platform": "x"})),
        ));
        let custom = Item::from_document(Document::new(
            "c",
            fields(json!({"isCustom": true, "title": "menu"})),
        ));

        assert_eq!(social.category, Category::social());
        assert_eq!(custom.category, Category::custom());
        assert!(social.fields.contains_key("isSocial"));
    }

    #[test]
    fn stored_id_field_is_dropped_on_decode() {
        let item = Item::from_document(Document::new(
            "real",
            fields(json!({"id": "stale-copy", "category": "custom"})),
        ));
        assert_eq!(item.id, Some(ItemId::from("real")));
        assert!(item.fields.is_empty());
    }

    #[test]
    fn normalized_strips_envelope_keys() {
        let item = Item::new(Category::custom())
            .with_field("id", "x")
            .with_field("category", "social")
            .with_field("url", "https://example.com")
            .normalized();

        assert_eq!(item.fields.len(), 1);
        assert_eq!(item.category, Category::custom());
    }

    #[test]
    fn paths_compose() {
        let teams = CollectionPath::new("teams");
        let team = teams.doc("abc");
        let links = team.collection("links");
        let link = links.doc("l1");

        assert_eq!(team.as_str(), "teams/abc");
        assert_eq!(links.as_str(), "teams/abc/links");
        assert_eq!(link.id(), "l1");
        assert_eq!(link.parent(), links);
    }

    #[test]
    fn field_equals_filter() {
        let filter = Filter::field_equals("used", false);
        assert!(filter.matches(&fields(json!({"used": false}))));
        assert!(!filter.matches(&fields(json!({"used": true}))));
        assert!(!filter.matches(&Fields::new()));
        assert!(Filter::All.matches(&Fields::new()));
    }
}
