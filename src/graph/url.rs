use anyhow::{Context, Result};
use reqwest::Url;

/// Default Microsoft Graph endpoint.
pub const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// `{base}/sites/{site}/{segments...}` with empty segments dropped.
pub fn build_graph_url(base: &str, site_id: &str, segments: &[&str]) -> String {
    let mut url = format!("{}/sites/{}", base.trim_end_matches('/'), site_id);
    for segment in segments.iter().filter(|s| !s.is_empty()) {
        url.push('/');
        url.push_str(segment);
    }
    url
}

/// OData filter clause matching items of a content type, combined with an extra clause.
pub fn build_filter_query(content_type_name: Option<&str>, extra: Option<&str>) -> Option<String> {
    let clauses: Vec<String> = content_type_name
        .filter(|name| !name.is_empty())
        .map(|name| {
            format!(
                "fields/ContentType/Name eq '{}'",
                name.replace('\'', "''")
            )
        })
        .into_iter()
        .chain(extra.filter(|f| !f.is_empty()).map(str::to_string))
        .collect();

    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" and "))
    }
}

/// Query options for item listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListItemsQuery {
    pub content_type_name: Option<String>,
    pub filter: Option<String>,
    pub select: Vec<String>,
    pub expand: Vec<String>,
    pub order_by: Option<String>,
    pub top: Option<u32>,
    pub skip: Option<u32>,
}

impl ListItemsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(mut self, name: impl Into<String>) -> Self {
        self.content_type_name = Some(name.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn expand<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expand = relations.into_iter().map(Into::into).collect();
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Appends `expand=fields` and the OData parameters to `base`.
    pub fn apply(&self, base: &str) -> Result<String> {
        let mut url = Url::parse(base).with_context(|| format!("Invalid Graph URL: {}", base))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("expand", "fields");

            if let Some(filter) =
                build_filter_query(self.content_type_name.as_deref(), self.filter.as_deref())
            {
                pairs.append_pair("$filter", &filter);
            }
            if !self.select.is_empty() {
                pairs.append_pair("$select", &self.select.join(","));
            }
            if !self.expand.is_empty() {
                pairs.append_pair("$expand", &self.expand.join(","));
            }
            if let Some(order_by) = &self.order_by {
                pairs.append_pair("$orderby", order_by);
            }
            if let Some(top) = self.top {
                pairs.append_pair("$top", &top.to_string());
            }
            if let Some(skip) = self.skip {
                pairs.append_pair("$skip", &skip.to_string());
            }
        }
        Ok(url.into())
    }
}

/// Query options for single-item fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemQuery {
    pub select: Vec<String>,
    pub expand: Vec<String>,
}

impl ItemQuery {
    pub fn apply(&self, base: &str) -> Result<String> {
        ListItemsQuery {
            select: self.select.clone(),
            expand: self.expand.clone(),
            ..ListItemsQuery::default()
        }
        .apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_pairs(url: &str) -> Vec<(String, String)> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_build_graph_url() {
        assert_eq!(
            build_graph_url(GRAPH_BASE, "site-1", &["lists", "l1", "items"]),
            "https://graph.microsoft.com/v1.0/sites/site-1/lists/l1/items"
        );
    }

    #[test]
    fn test_build_graph_url_skips_empty_segments_and_trailing_slash() {
        assert_eq!(
            build_graph_url("http://localhost:1234/", "s", &["", "lists", ""]),
            "http://localhost:1234/sites/s/lists"
        );
        assert_eq!(build_graph_url("http://h", "s", &[]), "http://h/sites/s");
    }

    #[test]
    fn test_build_filter_query() {
        assert_eq!(build_filter_query(None, None), None);
        assert_eq!(
            build_filter_query(Some("Invoice"), None).as_deref(),
            Some("fields/ContentType/Name eq 'Invoice'")
        );
        assert_eq!(
            build_filter_query(Some("Invoice"), Some("fields/Amount gt 10")).as_deref(),
            Some("fields/ContentType/Name eq 'Invoice' and fields/Amount gt 10")
        );
        assert_eq!(
            build_filter_query(None, Some("fields/Amount gt 10")).as_deref(),
            Some("fields/Amount gt 10")
        );
    }

    #[test]
    fn test_filter_escapes_single_quotes() {
        assert_eq!(
            build_filter_query(Some("Customer's Order"), None).as_deref(),
            Some("fields/ContentType/Name eq 'Customer''s Order'")
        );
    }

    #[test]
    fn test_items_query_always_expands_fields_first() {
        let url = ListItemsQuery::new().apply("http://h/sites/s/lists/l/items").unwrap();
        assert_eq!(query_pairs(&url), vec![("expand".into(), "fields".into())]);
    }

    #[test]
    fn test_items_query_parameters() {
        let url = ListItemsQuery::new()
            .content_type("Invoice")
            .select(["Title", "Amount"])
            .expand(["fields($select=Title)"])
            .order_by("fields/Modified desc")
            .top(50)
            .skip(10)
            .apply("http://h/sites/s/lists/l/items")
            .unwrap();

        assert_eq!(
            query_pairs(&url),
            vec![
                ("expand".to_string(), "fields".to_string()),
                (
                    "$filter".to_string(),
                    "fields/ContentType/Name eq 'Invoice'".to_string()
                ),
                ("$select".to_string(), "Title,Amount".to_string()),
                ("$expand".to_string(), "fields($select=Title)".to_string()),
                ("$orderby".to_string(), "fields/Modified desc".to_string()),
                ("$top".to_string(), "50".to_string()),
                ("$skip".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ListItemsQuery::new().apply("not a url").is_err());
    }
}
