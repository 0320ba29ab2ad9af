//! `sharepoint.config.json` loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::auth::ClientCredentials;
use crate::resolve::SelectionStrategy;
use crate::runtime::Runtime;

pub const DEFAULT_CONFIG_FILE: &str = "sharepoint.config.json";
pub const DEFAULT_OUTPUT_DIR: &str = "./generated";
pub const DEFAULT_OUTPUT_FILE: &str = "sp-types.ts";

pub const ENV_SITE_ID: &str = "SHAREPOINT_SITE_ID";
pub const ENV_TENANT_ID: &str = "SHAREPOINT_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "SHAREPOINT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SHAREPOINT_CLIENT_SECRET";
pub const ENV_ACCESS_TOKEN: &str = "SHAREPOINT_ACCESS_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpKitConfig {
    #[serde(default)]
    pub site_id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Identity platform authority, e.g. for national clouds.
    #[serde(default)]
    pub authority: Option<String>,
    #[serde(default)]
    pub graph_url: Option<String>,
    #[serde(default)]
    pub default_strategy: Option<SelectionStrategy>,
    #[serde(default)]
    pub content_types: Vec<ContentTypeConfig>,
    #[serde(default)]
    pub options: OutputOptions,
}

/// One logical content type to resolve and generate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_name: Option<String>,
    pub content_type_name: String,
    pub output_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<SelectionStrategy>,
}

impl ContentTypeConfig {
    pub fn new(content_type_name: impl Into<String>, output_type: impl Into<String>) -> Self {
        Self {
            content_type_name: content_type_name.into(),
            output_type: output_type.into(),
            ..Self::default()
        }
    }

    /// `listId`, ignoring blanks.
    pub fn list_id(&self) -> Option<&str> {
        self.list_id.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// `listName`, ignoring blanks.
    pub fn list_name(&self) -> Option<&str> {
        self.list_name.as_deref().filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputOptions {
    pub output_dir: PathBuf,
    pub output_file: String,
    /// Internal field name → property name in the generated interface.
    pub field_name_mapping: BTreeMap<String, String>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            field_name_mapping: BTreeMap::new(),
        }
    }
}

impl OutputOptions {
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }
}

impl SpKitConfig {
    /// Client-credential settings, when all three are present.
    pub fn credentials(&self) -> Option<ClientCredentials> {
        match (&self.tenant_id, &self.client_id, &self.client_secret) {
            (Some(tenant), Some(client), Some(secret)) => {
                let credentials = ClientCredentials::new(tenant, client, secret);
                Some(match &self.authority {
                    Some(authority) => credentials.with_authority(authority),
                    None => credentials,
                })
            }
            _ => None,
        }
    }

    /// Fills unset values from `SHAREPOINT_*` environment variables.
    fn apply_env<R: Runtime>(&mut self, runtime: &R) {
        let env = |key: &str| runtime.env_var(key).ok().filter(|v| !v.is_empty());

        if self.site_id.is_empty()
            && let Some(site_id) = env(ENV_SITE_ID)
        {
            debug!("Using site id from {}", ENV_SITE_ID);
            self.site_id = site_id;
        }
        for (slot, key) in [
            (&mut self.tenant_id, ENV_TENANT_ID),
            (&mut self.client_id, ENV_CLIENT_ID),
            (&mut self.client_secret, ENV_CLIENT_SECRET),
        ] {
            if slot.as_deref().is_none_or(str::is_empty) {
                *slot = env(key);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.site_id.trim().is_empty() {
            bail!("siteId is required (set it in the config or {})", ENV_SITE_ID);
        }
        if self.content_types.is_empty() {
            bail!("contentTypes must list at least one content type");
        }
        for (index, entry) in self.content_types.iter().enumerate() {
            if entry.content_type_name.trim().is_empty() {
                bail!("contentTypes[{}].contentTypeName is required", index);
            }
            if entry.output_type.trim().is_empty() {
                bail!("contentTypes[{}].outputType is required", index);
            }
        }
        if self.options.output_file.trim().is_empty() {
            bail!("options.outputFile must not be empty");
        }
        Ok(())
    }
}

/// Reads, completes from the environment and validates a config file.
pub fn load_config<R: Runtime>(runtime: &R, path: &Path) -> Result<SpKitConfig> {
    if !runtime.exists(path) {
        bail!("Config file not found: {}", path.display());
    }
    let content = runtime.read_to_string(path)?;
    let mut config: SpKitConfig = serde_json::from_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))?;

    config.apply_env(runtime);
    config.validate()?;
    Ok(config)
}
