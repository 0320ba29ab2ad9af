//! Persisted content-type → list resolutions.
//!
//! One JSON document per output directory. Every mutation reloads the whole
//! document, applies a change and writes it back; there is no locking, so the last
//! writer wins when two processes share a directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::runtime::Runtime;

/// Cache file name inside the output directory.
pub const CACHE_FILE: &str = ".sharepoint-cache.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheData {
    pub site_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    pub lists: Vec<CachedList>,
    pub resolutions: BTreeMap<String, CacheResolution>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CachedList {
    pub id: String,
    pub display_name: String,
    pub name: String,
    pub content_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheResolution {
    pub list_id: String,
    pub list_name: String,
    /// Hand-edited entries without a timestamp read as the Unix epoch.
    #[serde(default)]
    pub resolved_at: DateTime<Utc>,
}

pub struct ResolutionCache<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime> ResolutionCache<'a, R> {
    pub fn new(runtime: &'a R, output_dir: &Path) -> Self {
        Self {
            runtime,
            path: output_dir.join(CACHE_FILE),
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.path
    }

    /// Reads the cache. Missing, unreadable or malformed documents yield `None`.
    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> Option<CacheData> {
        if !self.runtime.exists(&self.path) {
            return None;
        }

        let content = match self.runtime.read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("Ignoring unreadable cache {}: {:#}", self.path.display(), e);
                return None;
            }
        };

        let value: Value = serde_json::from_str(&content).ok()?;
        if !value.is_object() {
            debug!("Ignoring cache {}: not a JSON object", self.path.display());
            return None;
        }
        match serde_json::from_value(value) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(
                    "Ignoring malformed cache {} (it will be replaced on the next save): {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    /// Writes the whole document, creating the directory if needed.
    pub fn save(&self, data: &CacheData) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !self.runtime.exists(parent)
        {
            self.runtime.create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(data).context("Failed to serialize cache")?;
        self.runtime
            .write(&self.path, json.as_bytes())
            .with_context(|| format!("Failed to write cache {}", self.path.display()))
    }

    pub fn get_resolution(&self, content_type_name: &str) -> Option<CacheResolution> {
        self.load()?.resolutions.remove(content_type_name)
    }

    /// Site the cached resolutions were made for, if any.
    pub fn site_id(&self) -> Option<String> {
        self.load()
            .map(|data| data.site_id)
            .filter(|site| !site.is_empty())
    }

    pub fn save_resolution(
        &self,
        site_id: &str,
        content_type_name: &str,
        list_id: &str,
        list_name: &str,
    ) -> Result<()> {
        self.update(site_id, |data| {
            data.resolutions.insert(
                content_type_name.to_string(),
                CacheResolution {
                    list_id: list_id.to_string(),
                    list_name: list_name.to_string(),
                    resolved_at: Utc::now(),
                },
            );
        })
    }

    /// Replaces the cached list snapshot.
    pub fn save_lists(&self, site_id: &str, lists: Vec<CachedList>) -> Result<()> {
        self.update(site_id, |data| data.lists = lists)
    }

    /// Empties the cache file in place. A missing file is left missing.
    pub fn clear(&self) -> Result<()> {
        if self.runtime.exists(&self.path) {
            self.runtime
                .write(&self.path, b"{}")
                .with_context(|| format!("Failed to clear cache {}", self.path.display()))?;
        }
        Ok(())
    }

    /// Load-or-default, stamp, mutate, persist.
    fn update(&self, site_id: &str, mutate: impl FnOnce(&mut CacheData)) -> Result<()> {
        let mut data = self.load().unwrap_or_default();
        data.site_id = site_id.to_string();
        data.last_updated = Some(Utc::now());
        mutate(&mut data);
        self.save(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use anyhow::anyhow;
    use chrono::Duration;
    use mockall::predicate::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_cache_loads_none() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let cache = ResolutionCache::new(&runtime, dir.path());

        assert!(cache.load().is_none());
        assert!(cache.get_resolution("Invoice").is_none());
        assert_eq!(cache.cache_path(), dir.path().join(CACHE_FILE));
    }

    #[test]
    fn test_save_resolution_round_trip() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let cache = ResolutionCache::new(&runtime, dir.path());

        cache
            .save_resolution("site-1", "Invoice", "list-1", "Invoices")
            .unwrap();
        let resolution = cache.get_resolution("Invoice").unwrap();

        assert_eq!(resolution.list_id, "list-1");
        assert_eq!(resolution.list_name, "Invoices");
        assert!(Utc::now() - resolution.resolved_at < Duration::seconds(60));

        let data = cache.load().unwrap();
        assert_eq!(data.site_id, "site-1");
        assert!(data.last_updated.is_some());
    }

    #[test]
    fn test_save_resolution_upserts_single_entry() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let cache = ResolutionCache::new(&runtime, dir.path());

        cache.save_resolution("s", "Invoice", "l1", "One").unwrap();
        cache.save_resolution("s", "Order", "l2", "Two").unwrap();
        cache.save_resolution("s", "Invoice", "l3", "Three").unwrap();

        let data = cache.load().unwrap();
        assert_eq!(data.resolutions.len(), 2);
        assert_eq!(data.resolutions["Invoice"].list_id, "l3");
        assert_eq!(data.resolutions["Order"].list_id, "l2");
    }

    #[test]
    fn test_save_lists_replaces_snapshot_and_keeps_resolutions() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let cache = ResolutionCache::new(&runtime, dir.path());

        cache.save_resolution("s", "Invoice", "l1", "One").unwrap();
        cache
            .save_lists(
                "s",
                vec![CachedList {
                    id: "a".into(),
                    display_name: "A".into(),
                    name: "a".into(),
                    content_types: vec!["Item".into()],
                }],
            )
            .unwrap();
        cache.save_lists("s", vec![]).unwrap();

        let data = cache.load().unwrap();
        assert!(data.lists.is_empty());
        assert_eq!(data.resolutions.len(), 1);
    }

    #[test]
    fn test_clear_keeps_file_and_empties_resolutions() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let cache = ResolutionCache::new(&runtime, dir.path());
        cache.save_resolution("s", "Invoice", "l1", "One").unwrap();

        cache.clear().unwrap();

        assert!(cache.cache_path().exists());
        assert_eq!(std::fs::read_to_string(cache.cache_path()).unwrap(), "{}");
        let data = cache.load().unwrap();
        assert!(data.resolutions.is_empty());
        assert!(cache.get_resolution("Invoice").is_none());
    }

    #[test]
    fn test_clear_without_file_does_nothing() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let cache = ResolutionCache::new(&runtime, dir.path());

        cache.clear().unwrap();
        assert!(!cache.cache_path().exists());
    }

    #[test]
    fn test_save_creates_output_dir() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("generated/nested");
        let runtime = RealRuntime;
        let cache = ResolutionCache::new(&runtime, &output);

        cache.save_resolution("s", "Invoice", "l1", "One").unwrap();

        let raw = std::fs::read_to_string(output.join(CACHE_FILE)).unwrap();
        assert!(raw.contains("\n  \"siteId\": \"s\""), "pretty printed: {}", raw);
        assert!(raw.contains("\"listName\": \"One\""));
    }

    #[test]
    fn test_malformed_documents_load_none() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let cache = ResolutionCache::new(&runtime, dir.path());

        for content in ["not json", "[1, 2]", "null", r#"{"resolutions": []}"#] {
            std::fs::write(cache.cache_path(), content).unwrap();
            assert!(cache.load().is_none(), "content {:?}", content);
        }
    }

    #[test]
    fn test_malformed_cache_is_replaced_on_write() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let cache = ResolutionCache::new(&runtime, dir.path());
        std::fs::write(cache.cache_path(), "garbage").unwrap();

        cache.save_resolution("s", "Invoice", "l1", "One").unwrap();
        assert_eq!(cache.get_resolution("Invoice").unwrap().list_id, "l1");
    }

    #[test]
    fn test_entry_without_timestamp_keeps_other_resolutions() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let cache = ResolutionCache::new(&runtime, dir.path());
        std::fs::write(
            cache.cache_path(),
            r#"{
                "siteId": "s",
                "resolutions": {
                    "Invoice": {"listId": "l1", "listName": "One", "resolvedAt": "2024-05-01T10:00:00Z"},
                    "Order": {"listId": "l2", "listName": "Two"}
                }
            }"#,
        )
        .unwrap();

        let order = cache.get_resolution("Order").unwrap();
        assert_eq!(order.list_id, "l2");
        assert_eq!(order.resolved_at, DateTime::<Utc>::default());

        cache.save_resolution("s", "Contract", "l3", "Three").unwrap();
        let data = cache.load().unwrap();
        assert_eq!(data.resolutions.len(), 3);
        assert_eq!(data.resolutions["Invoice"].list_id, "l1");
        assert_eq!(data.resolutions["Order"].list_name, "Two");
    }

    #[test]
    fn test_site_id() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let cache = ResolutionCache::new(&runtime, dir.path());
        assert!(cache.site_id().is_none());

        cache.save_resolution("site-9", "Invoice", "l1", "One").unwrap();
        assert_eq!(cache.site_id().as_deref(), Some("site-9"));
    }

    #[test]
    fn test_unreadable_cache_loads_none() {
        let mut runtime = MockRuntime::new();
        let path = PathBuf::from("/out").join(CACHE_FILE);

        runtime
            .expect_exists()
            .with(eq(path.clone()))
            .returning(|_| true);
        runtime
            .expect_read_to_string()
            .with(eq(path))
            .returning(|_| Err(anyhow!("permission denied")));

        let cache = ResolutionCache::new(&runtime, Path::new("/out"));
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_write_failure_propagates() {
        let mut runtime = MockRuntime::new();

        runtime.expect_exists().returning(|_| false);
        runtime
            .expect_create_dir_all()
            .with(eq(PathBuf::from("/out")))
            .times(1)
            .returning(|_| Ok(()));
        runtime
            .expect_write()
            .returning(|_, _| Err(anyhow!("disk full")));

        let cache = ResolutionCache::new(&runtime, Path::new("/out"));
        let err = cache
            .save_resolution("s", "Invoice", "l1", "One")
            .unwrap_err();
        assert!(format!("{:#}", err).contains("disk full"));
    }
}
