//! Content type → list resolution.
//!
//! Each configured entry is resolved through the first applicable path:
//!
//! 1. `listId` in config: the list is fetched directly; the cache is not involved.
//! 2. Cached resolution for the content type name.
//! 3. `listName` in config: matched against every list's display name or name.
//! 4. Full scan of every list's content types, with the selection policy deciding
//!    between multiple matches.
//!
//! Only single resolutions are written to the cache.

mod selection;

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::cache::ResolutionCache;
use crate::config::ContentTypeConfig;
use crate::graph::Catalog;
use crate::runtime::Runtime;

pub use selection::{
    ListInfo, ListSelection, PromptSelectionPolicy, ResolveError, SelectionPolicy,
    SelectionStrategy,
};

#[cfg(test)]
pub use selection::MockSelectionPolicy;

/// Outcome of resolving one configured entry against one list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContentType {
    pub content_type_name: String,
    pub output_type: String,
    pub list_id: String,
    pub list_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    pub site_id: String,
    /// Used when an entry has no strategy of its own.
    pub strategy: SelectionStrategy,
    /// `interactive` degrades to `first`.
    pub non_interactive: bool,
    /// Skip cache reads; results are still written through.
    pub refresh_cache: bool,
}

pub struct Resolver<'a, R: Runtime> {
    catalog: &'a dyn Catalog,
    cache: &'a ResolutionCache<'a, R>,
    policy: &'a dyn SelectionPolicy,
    options: ResolverOptions,
}

impl<'a, R: Runtime> Resolver<'a, R> {
    pub fn new(
        catalog: &'a dyn Catalog,
        cache: &'a ResolutionCache<'a, R>,
        policy: &'a dyn SelectionPolicy,
        options: ResolverOptions,
    ) -> Self {
        Self {
            catalog,
            cache,
            policy,
            options,
        }
    }

    /// Strategy for `entry`: its own, else the global one. Never `interactive`
    /// when running non-interactively.
    pub fn effective_strategy(&self, entry: &ContentTypeConfig) -> SelectionStrategy {
        let strategy = entry.strategy.unwrap_or(self.options.strategy);
        if self.options.non_interactive && strategy == SelectionStrategy::Interactive {
            SelectionStrategy::First
        } else {
            strategy
        }
    }

    /// Resolves one entry. An empty result means the entry was skipped.
    #[tracing::instrument(skip(self, entry), fields(content_type = %entry.content_type_name))]
    pub async fn resolve(&self, entry: &ContentTypeConfig) -> Result<Vec<ResolvedContentType>> {
        if let Some(list_id) = entry.list_id() {
            let list = self
                .catalog
                .get_list(list_id)
                .await
                .with_context(|| format!("Failed to fetch list {}", list_id))?;
            println!("  Using list: {} ({})", list.display_name, list.id);
            return Ok(vec![resolved(entry, &list.id, &list.display_name)]);
        }

        if !self.options.refresh_cache
            && let Some(cached) = self.cached_resolution(&entry.content_type_name)
        {
            println!("  Using cached resolution: {}", cached.list_name);
            return Ok(vec![resolved(entry, &cached.list_id, &cached.list_name)]);
        }

        if let Some(list_name) = entry.list_name() {
            return self.resolve_by_name(entry, list_name).await;
        }

        self.resolve_by_scan(entry).await
    }

    fn cached_resolution(&self, content_type_name: &str) -> Option<crate::cache::CacheResolution> {
        let resolution = self.cache.get_resolution(content_type_name)?;
        if let Some(cached_site) = self.cache.site_id()
            && cached_site != self.options.site_id
        {
            warn!(
                "Cache {} was written for site {} but site {} is configured; run with --clear-cache if resolutions are stale",
                self.cache.cache_path().display(),
                cached_site,
                self.options.site_id
            );
        }
        Some(resolution)
    }

    async fn resolve_by_name(
        &self,
        entry: &ContentTypeConfig,
        list_name: &str,
    ) -> Result<Vec<ResolvedContentType>> {
        let lists = self.catalog.get_lists().await?;
        let list = lists
            .iter()
            .find(|list| list.display_name == list_name || list.name == list_name)
            .ok_or_else(|| ResolveError::ListNotFound {
                list_name: list_name.to_string(),
                site_id: self.options.site_id.clone(),
            })?;

        println!("  Found list: {} ({})", list.display_name, list.id);
        self.remember(entry, &list.id, &list.display_name)?;
        Ok(vec![resolved(entry, &list.id, &list.display_name)])
    }

    async fn resolve_by_scan(&self, entry: &ContentTypeConfig) -> Result<Vec<ResolvedContentType>> {
        let name = &entry.content_type_name;
        println!("  Searching lists for content type \"{}\"...", name);

        let lists = self.catalog.get_lists().await?;
        let mut matches = Vec::new();
        for list in &lists {
            match self.catalog.get_list_content_types(&list.id).await {
                Ok(content_types) if content_types.iter().any(|ct| &ct.name == name) => {
                    matches.push(ListInfo::from(list));
                }
                Ok(_) => {}
                Err(e) => debug!("Skipping list {} ({}): {:#}", list.display_name, list.id, e),
            }
        }

        match matches.as_slice() {
            [] => Err(ResolveError::ContentTypeNotFound {
                content_type: name.clone(),
                site_id: self.options.site_id.clone(),
            }
            .into()),
            [only] => {
                println!("  Found in list: {} ({})", only.display_name, only.id);
                self.remember(entry, &only.id, &only.display_name)?;
                Ok(vec![resolved(entry, &only.id, &only.display_name)])
            }
            candidates => {
                let strategy = self.effective_strategy(entry);
                let selection = self.policy.select(name, candidates, strategy)?;
                self.apply_selection(entry, selection)
            }
        }
    }

    fn apply_selection(
        &self,
        entry: &ContentTypeConfig,
        selection: Vec<ListSelection>,
    ) -> Result<Vec<ResolvedContentType>> {
        match selection.as_slice() {
            [] => {
                println!("  Skipped");
                Ok(Vec::new())
            }
            [one] => {
                self.remember(entry, &one.list_id, &one.list_name)?;
                Ok(vec![resolved(entry, &one.list_id, &one.list_name)])
            }
            many => Ok(many
                .iter()
                .map(|s| ResolvedContentType {
                    output_type: format!(
                        "{}_{}",
                        entry.output_type,
                        s.list_name.split_whitespace().collect::<String>()
                    ),
                    ..resolved(entry, &s.list_id, &s.list_name)
                })
                .collect()),
        }
    }

    fn remember(&self, entry: &ContentTypeConfig, list_id: &str, list_name: &str) -> Result<()> {
        self.cache.save_resolution(
            &self.options.site_id,
            &entry.content_type_name,
            list_id,
            list_name,
        )
    }
}

fn resolved(entry: &ContentTypeConfig, list_id: &str, list_name: &str) -> ResolvedContentType {
    ResolvedContentType {
        content_type_name: entry.content_type_name.clone(),
        output_type: entry.output_type.clone(),
        list_id: list_id.to_string(),
        list_name: list_name.to_string(),
    }
}
