//! TypeScript interface rendering.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::graph::{Catalog, Column, FieldType};
use crate::resolve::ResolvedContentType;

/// Columns SharePoint manages itself; never part of a generated interface.
const SYSTEM_COLUMNS: &[&str] = &[
    "ContentType",
    "Modified",
    "Created",
    "Author",
    "Editor",
    "_ModerationComments",
    "_ModerationStatus",
    "FileSystemObjectType",
    "ServerRedirectedEmbedUri",
    "ServerRedirectedEmbedUrl",
    "ID",
    "ContentTypeId",
    "Attachments",
    "GUID",
    "OData__UIVersionString",
    "ComplianceAssetId",
];

/// One property of a generated interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceField {
    pub name: String,
    pub ts_type: String,
    pub required: bool,
    pub description: Option<String>,
}

pub fn file_header() -> String {
    [
        "/**",
        " * Auto-generated by spkit. Do not edit by hand.",
        " * Regenerate with `spkit generate`.",
        " */",
    ]
    .join("\n")
}

pub fn ts_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Text | FieldType::Note | FieldType::Choice | FieldType::DateTime => "string",
        FieldType::Number | FieldType::Currency => "number",
        FieldType::Boolean => "boolean",
        FieldType::MultiChoice => "string[]",
        FieldType::Lookup => "{ id: number; value: string }",
        FieldType::User => "{ id: number; displayName: string; email: string }",
        FieldType::Url
        | FieldType::Calculated
        | FieldType::Taxonomy
        | FieldType::Unknown => "unknown",
    }
}

/// Keeps `[A-Za-z0-9_]`; a leading digit gets a `_` prefix.
pub fn sanitize_interface_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", cleaned)
    } else {
        cleaned
    }
}

fn property_name(name: &str) -> String {
    let mut chars = name.chars();
    let is_identifier = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if is_identifier {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

pub fn render_interface(name: &str, fields: &[InterfaceField]) -> String {
    let mut out = format!("export interface {} {{\n", name);
    for field in fields {
        if let Some(description) = &field.description {
            out.push_str(&format!("  /** {} */\n", description.replace("*/", "*\\/")));
        }
        out.push_str(&format!(
            "  {}{}: {};\n",
            property_name(&field.name),
            if field.required { "" } else { "?" },
            field.ts_type
        ));
    }
    out.push('}');
    out
}

fn is_system_column(name: &str) -> bool {
    SYSTEM_COLUMNS.contains(&name)
}

/// Writable, non-system columns as interface properties.
pub fn interface_fields(
    columns: &[Column],
    field_name_mapping: &BTreeMap<String, String>,
) -> Vec<InterfaceField> {
    columns
        .iter()
        .filter(|col| !col.read_only && !is_system_column(&col.name))
        .map(|col| InterfaceField {
            name: field_name_mapping
                .get(&col.name)
                .cloned()
                .unwrap_or_else(|| col.name.clone()),
            ts_type: ts_type(col.field_type).to_string(),
            required: col.required,
            description: (col.display_name != col.name).then(|| col.display_name.clone()),
        })
        .collect()
}

/// Renders one interface per resolved entry, reading columns from the catalog.
pub async fn generate_typescript(
    resolved: &[ResolvedContentType],
    catalog: &dyn Catalog,
    field_name_mapping: &BTreeMap<String, String>,
) -> Result<String> {
    let mut interfaces = vec![file_header()];

    for entry in resolved {
        println!(
            "  Generating interface \"{}\" from list \"{}\"...",
            entry.output_type, entry.list_name
        );

        let content_types = catalog.get_list_content_types(&entry.list_id).await?;
        let columns = match content_types
            .iter()
            .find(|ct| ct.name == entry.content_type_name)
        {
            Some(content_type) => catalog.get_columns(&content_type.id).await?,
            None => {
                println!("    Content type not attached to the list, falling back to list columns");
                catalog.get_list_columns(&entry.list_id).await?
            }
        };

        let fields = interface_fields(&columns, field_name_mapping);
        interfaces.push(render_interface(
            &sanitize_interface_name(&entry.output_type),
            &fields,
        ));
    }

    Ok(interfaces.join("\n\n") + "\n")
}
