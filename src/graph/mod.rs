//! SharePoint data model and Graph operations.
//!
//! [`SharePointClient`] exposes item CRUD and read-only enumerations on top of
//! [`crate::http::HttpClient`]. The [`Catalog`] trait is the read-only slice the
//! resolver and the generator depend on.

mod client;
mod field_name;
mod url;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use client::SharePointClient;
pub use field_name::{decode_field_name, encode_field_name};
pub use url::{GRAPH_BASE, ItemQuery, ListItemsQuery, build_filter_query, build_graph_url};

/// Untyped item fields.
pub type FieldMap = Map<String, Value>;

/// A list item. `F` is the field payload, untyped by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem<F = FieldMap> {
    pub id: String,
    pub fields: F,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentTypeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
}

impl<F> ListItem<F> {
    /// An item carrying only an id and fields.
    pub fn new(id: impl Into<String>, fields: F) -> Self {
        Self {
            id: id.into(),
            fields,
            content_type: None,
            created_date_time: None,
            last_modified_date_time: None,
            created_by: None,
            last_modified_by: None,
            web_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTypeRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<IdentityUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A list snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SpList {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_date_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub web_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContentType {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_built_in: Option<bool>,
}

/// SharePoint column kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FieldType {
    Text,
    Note,
    Number,
    Currency,
    DateTime,
    Boolean,
    Choice,
    MultiChoice,
    Lookup,
    User,
    #[serde(rename = "URL")]
    Url,
    Calculated,
    Taxonomy,
    #[default]
    #[serde(other)]
    Unknown,
}

impl FieldType {
    /// Infers the kind from the facet properties Graph puts on a column definition.
    fn from_facets(facets: &Map<String, Value>) -> Self {
        let has = |key: &str| facets.get(key).is_some_and(|v| !v.is_null());

        if let Some(text) = facets.get("text").filter(|v| !v.is_null()) {
            let multiline = text
                .get("allowMultipleLines")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            return if multiline { Self::Note } else { Self::Text };
        }
        if let Some(choice) = facets.get("choice").filter(|v| !v.is_null()) {
            let checkboxes = choice.get("displayAs").and_then(Value::as_str) == Some("checkBoxes");
            return if checkboxes {
                Self::MultiChoice
            } else {
                Self::Choice
            };
        }

        [
            ("number", Self::Number),
            ("currency", Self::Currency),
            ("dateTime", Self::DateTime),
            ("boolean", Self::Boolean),
            ("lookup", Self::Lookup),
            ("personOrGroup", Self::User),
            ("hyperlinkOrPicture", Self::Url),
            ("calculated", Self::Calculated),
            ("term", Self::Taxonomy),
        ]
        .into_iter()
        .find(|(key, _)| has(key))
        .map(|(_, kind)| kind)
        .unwrap_or(Self::Unknown)
    }
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawColumn")]
pub struct Column {
    pub id: String,
    pub name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

/// Wire shape: either an explicit `type` or Graph facets.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawColumn {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(rename = "type", default)]
    field_type: Option<FieldType>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    default_value: Option<Value>,
    #[serde(flatten)]
    facets: Map<String, Value>,
}

impl From<RawColumn> for Column {
    fn from(raw: RawColumn) -> Self {
        let field_type = raw
            .field_type
            .unwrap_or_else(|| FieldType::from_facets(&raw.facets));
        let description = raw.description.filter(|d| !d.is_empty());
        Column {
            id: raw.id,
            name: raw.name,
            display_name: raw.display_name,
            field_type,
            required: raw.required,
            read_only: raw.read_only,
            description,
            default_value: raw.default_value.filter(|v| !v.is_null()),
        }
    }
}

/// Read-only site catalog used by resolution and generation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    /// All lists of the site.
    async fn get_lists(&self) -> Result<Vec<SpList>>;

    /// A single list by id.
    async fn get_list(&self, list_id: &str) -> Result<SpList>;

    /// Content types attached to a list.
    async fn get_list_content_types(&self, list_id: &str) -> Result<Vec<ContentType>>;

    /// Columns of a site content type.
    async fn get_columns(&self, content_type_id: &str) -> Result<Vec<Column>>;

    /// Columns of a list.
    async fn get_list_columns(&self, list_id: &str) -> Result<Vec<Column>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_with_explicit_type() {
        let column: Column = serde_json::from_str(
            r#"{"id": "c1", "name": "Amount", "displayName": "Tutar", "type": "Currency",
                "required": true, "readOnly": false}"#,
        )
        .unwrap();
        assert_eq!(column.field_type, FieldType::Currency);
        assert!(column.required);
        assert_eq!(column.display_name, "Tutar");
    }

    #[test]
    fn test_column_unknown_type_name() {
        let column: Column =
            serde_json::from_str(r#"{"id": "c1", "name": "X", "displayName": "X", "type": "Geo"}"#)
                .unwrap();
        assert_eq!(column.field_type, FieldType::Unknown);
    }

    #[test]
    fn test_column_type_from_graph_facets() {
        let cases = [
            (r#"{"text": {"allowMultipleLines": false}}"#, FieldType::Text),
            (r#"{"text": {"allowMultipleLines": true}}"#, FieldType::Note),
            (r#"{"number": {}}"#, FieldType::Number),
            (r#"{"currency": {"locale": "tr-TR"}}"#, FieldType::Currency),
            (r#"{"dateTime": {}}"#, FieldType::DateTime),
            (r#"{"boolean": {}}"#, FieldType::Boolean),
            (r#"{"choice": {"displayAs": "dropDownMenu"}}"#, FieldType::Choice),
            (r#"{"choice": {"displayAs": "checkBoxes"}}"#, FieldType::MultiChoice),
            (r#"{"lookup": {"listId": "l"}}"#, FieldType::Lookup),
            (r#"{"personOrGroup": {}}"#, FieldType::User),
            (r#"{"hyperlinkOrPicture": {}}"#, FieldType::Url),
            (r#"{"calculated": {}}"#, FieldType::Calculated),
            (r#"{"term": {}}"#, FieldType::Taxonomy),
            (r#"{}"#, FieldType::Unknown),
        ];

        for (facet, expected) in cases {
            let mut value: Value = serde_json::from_str(facet).unwrap();
            value["id"] = "c".into();
            value["name"] = "N".into();
            value["displayName"] = "N".into();
            let column: Column = serde_json::from_value(value).unwrap();
            assert_eq!(column.field_type, expected, "facet {}", facet);
        }
    }

    #[test]
    fn test_column_serializes_type_name() {
        let column: Column = serde_json::from_str(
            r#"{"id": "c", "name": "Link", "displayName": "Link", "type": "URL"}"#,
        )
        .unwrap();
        let json = serde_json::to_value(&column).unwrap();
        assert_eq!(json["type"], "URL");
        assert_eq!(json["readOnly"], false);
    }

    #[test]
    fn test_list_item_defaults() {
        let item: ListItem =
            serde_json::from_str(r#"{"id": "1", "fields": {"Title": "A"}}"#).unwrap();
        assert_eq!(item.fields["Title"], "A");
        assert!(item.content_type.is_none());
        assert!(item.web_url.is_none());
    }

    #[test]
    fn test_list_tolerates_missing_optional_fields() {
        let list: SpList = serde_json::from_str(r#"{"id": "l1", "displayName": "Invoices"}"#).unwrap();
        assert_eq!(list.display_name, "Invoices");
        assert_eq!(list.name, "");
        assert!(list.description.is_none());
    }
}
