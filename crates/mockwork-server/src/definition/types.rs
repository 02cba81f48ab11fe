//! Type definitions for mock endpoint definitions.
//!
//! Field names follow the persisted JSON layout so existing data files load
//! unchanged.

use serde::{Deserialize, Serialize};

// ============================================================================
// KV Fields
// ============================================================================

/// Generic key/value row used for headers, query params, status and form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvField {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub index: u32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl KvField {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// A row with an empty key or value takes no part in matching or rewriting.
    pub fn is_inert(&self) -> bool {
        self.key.is_empty() || self.value.is_empty()
    }
}

/// Ordered list of [`KvField`] rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KvFields(pub Vec<KvField>);

impl KvFields {
    /// First row whose key matches case-insensitively and whose value is set.
    pub fn get(&self, key: &str) -> Option<&KvField> {
        self.0
            .iter()
            .find(|f| f.key.eq_ignore_ascii_case(key) && !f.value.is_empty())
    }

    /// First row whose key matches byte-for-byte and whose value is set.
    pub fn get_exact(&self, key: &str) -> Option<&KvField> {
        self.0.iter().find(|f| f.key == key && !f.value.is_empty())
    }

    /// Active (non-inert) rows as `(key, value)` pairs, in declaration order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter(|f| !f.is_inert())
            .map(|f| (f.key.as_str(), f.value.as_str()))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KvField> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<KvField> for KvFields {
    fn from_iter<I: IntoIterator<Item = KvField>>(iter: I) -> Self {
        KvFields(iter.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KvFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        KvFields(iter.into_iter().map(|(k, v)| KvField::new(k, v)).collect())
    }
}

// ============================================================================
// Mock Body
// ============================================================================

/// Body source of a mock response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyKind {
    /// Templated inline text.
    Raw,
    /// Bytes read verbatim from disk.
    File,
    #[default]
    None,
}

impl BodyKind {
    /// Unknown data types behave as `none`.
    pub fn parse(data_type: &str) -> Self {
        match data_type {
            "raw" => BodyKind::Raw,
            "file" => BodyKind::File,
            _ => BodyKind::None,
        }
    }
}

/// Sub-type of a raw body, selecting the response content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RawType {
    Json,
    Xml,
    Html,
    #[default]
    Text,
}

impl RawType {
    pub fn parse(raw_type: &str) -> Self {
        match raw_type {
            "json" => RawType::Json,
            "xml" => RawType::Xml,
            "html" => RawType::Html,
            _ => RawType::Text,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            RawType::Json => "application/json",
            RawType::Xml => "application/xml",
            RawType::Html => "text/html",
            RawType::Text => "text/plain",
        }
    }
}

/// Reference to a file on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
}

/// Mock body specification as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockBody {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_value: Option<FileRef>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub form_type: String,
    #[serde(default, skip_serializing_if = "KvFields::is_empty")]
    pub form_value: KvFields,
}

impl MockBody {
    pub fn raw(raw_type: &str, value: impl Into<String>) -> Self {
        Self {
            data_type: "raw".to_string(),
            raw_type: raw_type.to_string(),
            raw_value: value.into(),
            ..Default::default()
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            data_type: "file".to_string(),
            file_value: Some(FileRef {
                path: path.into(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> BodyKind {
        BodyKind::parse(&self.data_type)
    }

    pub fn raw_kind(&self) -> RawType {
        RawType::parse(&self.raw_type)
    }

    pub fn file_path(&self) -> &str {
        self.file_value
            .as_ref()
            .map(|f| f.path.as_str())
            .unwrap_or_default()
    }
}

// ============================================================================
// Definition
// ============================================================================

/// Configuration of one mock endpoint: the match rule plus the response rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    #[serde(rename = "collectId", default)]
    pub collect_id: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub method: String,
    /// Path pattern; may embed `{var}` segments and a literal query string.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub route_headers: KvFields,
    #[serde(default)]
    pub route_params: KvFields,
    #[serde(default)]
    pub mock_status: KvFields,
    #[serde(default)]
    pub mock_headers: KvFields,
    #[serde(default)]
    pub mock_body: Option<MockBody>,
}

impl Definition {
    pub fn new(id: impl Into<String>, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn body_kind(&self) -> BodyKind {
        self.mock_body
            .as_ref()
            .map(MockBody::kind)
            .unwrap_or_default()
    }
}

// ============================================================================
// Collection
// ============================================================================

/// Named group of definitions, used by management tooling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub paths: Vec<Definition>,
}

/// Attach each definition to the collection named by its `collectId`.
///
/// Collections keep their order; `paths` is replaced, so stale members from a
/// previous grouping never survive. Definitions naming an unknown collection are
/// left out.
pub fn group_by_collection(
    mut collections: Vec<Collection>,
    definitions: Vec<Definition>,
) -> Vec<Collection> {
    for collection in &mut collections {
        collection.paths.clear();
    }
    for definition in definitions {
        if let Some(collection) = collections
            .iter_mut()
            .find(|c| c.id == definition.collect_id)
        {
            collection.paths.push(definition);
        }
    }
    collections
}
