use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::debug;
use reqwest::Url;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::http::{HttpClient, RequestOptions};

use super::url::{GRAPH_BASE, ItemQuery, ListItemsQuery, build_graph_url};
use super::{Catalog, Column, ContentType, ContentTypeRef, Identity, ListItem, Site, SpList};

/// Graph collection envelope.
#[derive(Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

impl<T> Collection<T> {
    fn into_values(self, url: &str) -> Vec<T> {
        if self.next_link.is_some() {
            debug!("{}: more results are available than the first page", url);
        }
        self.value
    }
}

/// Item as Graph returns it, before the field payload is typed.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    id: String,
    #[serde(default)]
    fields: Value,
    created_date_time: Option<String>,
    last_modified_date_time: Option<String>,
    created_by: Option<Identity>,
    last_modified_by: Option<Identity>,
    web_url: Option<String>,
}

impl RawItem {
    fn into_item<F: DeserializeOwned>(self) -> Result<ListItem<F>> {
        // Graph only exposes the content type name through the expanded fields.
        let content_type = self
            .fields
            .get("ContentType")
            .and_then(|ct| ct.get("Name"))
            .and_then(Value::as_str)
            .map(|name| ContentTypeRef {
                id: String::new(),
                name: name.to_string(),
            });

        let fields = serde_json::from_value(self.fields)
            .with_context(|| format!("Failed to decode fields of item {}", self.id))?;

        Ok(ListItem {
            id: self.id,
            fields,
            content_type,
            created_date_time: self.created_date_time,
            last_modified_date_time: self.last_modified_date_time,
            created_by: self.created_by,
            last_modified_by: self.last_modified_by,
            web_url: self.web_url,
        })
    }
}

/// Site-scoped SharePoint operations over Microsoft Graph.
#[derive(Clone)]
pub struct SharePointClient {
    http: HttpClient,
    site_id: String,
    graph_url: String,
}

impl SharePointClient {
    pub fn new(http: HttpClient, site_id: impl Into<String>) -> Self {
        Self {
            http,
            site_id: site_id.into(),
            graph_url: GRAPH_BASE.to_string(),
        }
    }

    /// Overrides the Graph endpoint, e.g. for a national cloud or a local stub.
    pub fn with_graph_url(mut self, graph_url: impl Into<String>) -> Self {
        self.graph_url = graph_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn graph_url(&self) -> &str {
        &self.graph_url
    }

    fn site_url(&self, segments: &[&str]) -> String {
        build_graph_url(&self.graph_url, &self.site_id, segments)
    }

    async fn get_collection<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let collection: Collection<T> = self.http.request(url, RequestOptions::get()).await?;
        Ok(collection.into_values(url))
    }

    /// Items of a list, optionally restricted to one content type.
    #[tracing::instrument(skip(self, query))]
    pub async fn get_list_items<F: DeserializeOwned>(
        &self,
        list_id: &str,
        query: &ListItemsQuery,
    ) -> Result<Vec<ListItem<F>>> {
        let url = query.apply(&self.site_url(&["lists", list_id, "items"]))?;
        self.get_collection::<RawItem>(&url)
            .await?
            .into_iter()
            .map(RawItem::into_item)
            .collect()
    }

    #[tracing::instrument(skip(self, query))]
    pub async fn get_item<F: DeserializeOwned>(
        &self,
        list_id: &str,
        item_id: &str,
        query: &ItemQuery,
    ) -> Result<ListItem<F>> {
        let url = query.apply(&self.site_url(&["lists", list_id, "items", item_id]))?;
        let raw: RawItem = self.http.request(&url, RequestOptions::get()).await?;
        raw.into_item()
    }

    /// Creates an item. When `content_type_id` is given the item is bound to that
    /// content type through `ContentType@odata.type`.
    #[tracing::instrument(skip(self, fields))]
    pub async fn create_item<F>(
        &self,
        list_id: &str,
        fields: &F,
        content_type_id: Option<&str>,
    ) -> Result<ListItem<F>>
    where
        F: Serialize + DeserializeOwned,
    {
        let mut payload = match serde_json::to_value(fields).context("Failed to encode item fields")? {
            Value::Object(map) => map,
            other => return Err(anyhow!("Item fields must be a JSON object, got {}", other)),
        };
        if let Some(content_type_id) = content_type_id {
            payload.insert("ContentType@odata.type".to_string(), json!(content_type_id));
        }

        let url = self.site_url(&["lists", list_id, "items"]);
        let raw: RawItem = self
            .http
            .request(&url, RequestOptions::post(json!({ "fields": payload })))
            .await?;
        raw.into_item()
    }

    /// Patches the fields of an item. The result carries the item id and the fields
    /// the service echoed back; metadata is not re-read.
    #[tracing::instrument(skip(self, fields))]
    pub async fn update_item<F>(&self, list_id: &str, item_id: &str, fields: &F) -> Result<ListItem<F>>
    where
        F: Serialize + DeserializeOwned,
    {
        let body = serde_json::to_value(fields).context("Failed to encode item fields")?;
        let url = self.site_url(&["lists", list_id, "items", item_id, "fields"]);
        let updated: F = self.http.request(&url, RequestOptions::patch(body)).await?;
        Ok(ListItem::new(item_id, updated))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_item(&self, list_id: &str, item_id: &str) -> Result<()> {
        let url = self.site_url(&["lists", list_id, "items", item_id]);
        let _: Option<Value> = self.http.request(&url, RequestOptions::delete()).await?;
        Ok(())
    }

    /// Tenant-wide site enumeration, optionally filtered by `search`.
    pub async fn get_sites(&self, search: Option<&str>) -> Result<Vec<Site>> {
        let url = sites_url(&self.graph_url, search)?;
        self.get_collection(url.as_str()).await
    }

    pub async fn get_lists(&self) -> Result<Vec<SpList>> {
        self.get_collection(&self.site_url(&["lists"])).await
    }

    pub async fn get_list(&self, list_id: &str) -> Result<SpList> {
        self.http
            .request(&self.site_url(&["lists", list_id]), RequestOptions::get())
            .await
    }

    /// Site content types, or the content types of one list.
    pub async fn get_content_types(&self, list_id: Option<&str>) -> Result<Vec<ContentType>> {
        match list_id {
            Some(list_id) => self.get_list_content_types(list_id).await,
            None => self.get_collection(&self.site_url(&["contentTypes"])).await,
        }
    }

    pub async fn get_list_content_types(&self, list_id: &str) -> Result<Vec<ContentType>> {
        self.get_collection(&self.site_url(&["lists", list_id, "contentTypes"]))
            .await
    }

    pub async fn get_columns(&self, content_type_id: &str) -> Result<Vec<Column>> {
        self.get_collection(&self.site_url(&["contentTypes", content_type_id, "columns"]))
            .await
    }

    pub async fn get_list_columns(&self, list_id: &str) -> Result<Vec<Column>> {
        self.get_collection(&self.site_url(&["lists", list_id, "columns"]))
            .await
    }
}

#[async_trait]
impl Catalog for SharePointClient {
    async fn get_lists(&self) -> Result<Vec<SpList>> {
        SharePointClient::get_lists(self).await
    }

    async fn get_list(&self, list_id: &str) -> Result<SpList> {
        SharePointClient::get_list(self, list_id).await
    }

    async fn get_list_content_types(&self, list_id: &str) -> Result<Vec<ContentType>> {
        SharePointClient::get_list_content_types(self, list_id).await
    }

    async fn get_columns(&self, content_type_id: &str) -> Result<Vec<Column>> {
        SharePointClient::get_columns(self, content_type_id).await
    }

    async fn get_list_columns(&self, list_id: &str) -> Result<Vec<Column>> {
        SharePointClient::get_list_columns(self, list_id).await
    }
}

/// `{graph}/sites`, with `?search=` only for a non-empty search.
fn sites_url(graph_url: &str, search: Option<&str>) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/sites", graph_url))
        .with_context(|| format!("Invalid Graph URL: {}", graph_url))?;
    if let Some(search) = search.filter(|s| !s.is_empty()) {
        url.query_pairs_mut().append_pair("search", search);
    }
    Ok(url)
}
