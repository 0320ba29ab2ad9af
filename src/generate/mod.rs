//! `spkit generate`: resolve every configured content type, then write interfaces.

mod typescript;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use log::debug;
use reqwest::Client;

use crate::auth::{ProviderSession, StaticToken, TokenProvider};
use crate::cache::ResolutionCache;
use crate::config::{
    ENV_ACCESS_TOKEN, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_TENANT_ID, SpKitConfig, load_config,
};
use crate::graph::{GRAPH_BASE, SharePointClient};
use crate::http::HttpClient;
use crate::resolve::{PromptSelectionPolicy, Resolver, ResolverOptions, SelectionStrategy};
use crate::runtime::Runtime;

pub use typescript::{
    InterfaceField, file_header, generate_typescript, interface_fields, render_interface,
    sanitize_interface_name, ts_type,
};

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub config_path: PathBuf,
    /// Abort on the first failing entry; `interactive` becomes `first`.
    pub non_interactive: bool,
    /// Overrides `defaultStrategy` from the config.
    pub strategy: Option<SelectionStrategy>,
    /// Empty the resolution cache and stop.
    pub clear_cache: bool,
    /// Resolve without reading the cache.
    pub update_cache: bool,
    /// Overrides `graphUrl` from the config.
    pub graph_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    CacheCleared(PathBuf),
    NothingResolved,
    Written { path: PathBuf, interfaces: usize },
}

/// Builds the reqwest client shared by token acquisition and Graph calls.
pub fn build_http_client() -> Result<Client> {
    let client = Client::builder()
        .user_agent(concat!("spkit/", env!("SPKIT_VERSION")))
        .build()?;
    Ok(client)
}

/// `SHAREPOINT_ACCESS_TOKEN` when set, otherwise the client-credential flow.
pub fn token_provider<R: Runtime>(
    runtime: &R,
    config: &SpKitConfig,
    session: &mut ProviderSession,
) -> Result<Arc<dyn TokenProvider>> {
    if let Ok(token) = runtime.env_var(ENV_ACCESS_TOKEN)
        && !token.is_empty()
    {
        debug!("Using bearer token from {}", ENV_ACCESS_TOKEN);
        return Ok(Arc::new(StaticToken::new(token)));
    }

    if config.tenant_id.is_none() || config.client_id.is_none() {
        bail!(
            "tenantId and clientId are required in config for authentication. You can set them via environment variables: {}, {}",
            ENV_TENANT_ID,
            ENV_CLIENT_ID
        );
    }
    let Some(credentials) = config.credentials() else {
        bail!(
            "clientSecret is required for authentication. Set it in config or via {} environment variable",
            ENV_CLIENT_SECRET
        );
    };

    Ok(session.provider(&credentials))
}

/// Runs the whole generation. Entries are processed one after another.
#[tracing::instrument(skip(runtime, options), fields(config = %options.config_path.display()))]
pub async fn generate_types<R: Runtime>(runtime: &R, options: GenerateOptions) -> Result<GenerateOutcome> {
    println!("\nSharePoint Kit - Type Generator\n");

    let config = load_config(runtime, &options.config_path)?;
    let output = &config.options;
    let cache = ResolutionCache::new(runtime, &output.output_dir);

    if options.clear_cache {
        cache.clear()?;
        println!("Cache cleared.\n");
        return Ok(GenerateOutcome::CacheCleared(cache.cache_path().to_path_buf()));
    }

    let strategy = options
        .strategy
        .or(config.default_strategy)
        .unwrap_or_default();
    let output_path = output.output_path();

    println!("Site: {}", config.site_id);
    println!("Strategy: {}", strategy);
    println!("Output: {}\n", output_path.display());

    let http = build_http_client()?;
    let mut session = ProviderSession::new(http.clone());
    let tokens = token_provider(runtime, &config, &mut session)?;

    let graph_url = options
        .graph_url
        .or_else(|| config.graph_url.clone())
        .unwrap_or_else(|| GRAPH_BASE.to_string());
    let client = SharePointClient::new(HttpClient::new(http, tokens), config.site_id.clone())
        .with_graph_url(graph_url);

    let policy = PromptSelectionPolicy::new(runtime);
    let resolver = Resolver::new(
        &client,
        &cache,
        &policy,
        ResolverOptions {
            site_id: config.site_id.clone(),
            strategy,
            non_interactive: options.non_interactive,
            refresh_cache: options.update_cache,
        },
    );

    println!("Scanning SharePoint site...\n");

    let mut resolved = Vec::new();
    for entry in &config.content_types {
        println!(
            "Processing: \"{}\" -> {}",
            entry.content_type_name, entry.output_type
        );

        match resolver.resolve(entry).await {
            Ok(entries) => resolved.extend(entries),
            Err(e) => {
                eprintln!("  Error: {:#}", e);
                if options.non_interactive {
                    return Err(e);
                }
            }
        }
    }

    if resolved.is_empty() {
        println!("\nNo content types resolved. Nothing to generate.\n");
        return Ok(GenerateOutcome::NothingResolved);
    }

    println!("\nGenerating TypeScript interfaces...\n");
    let content = generate_typescript(&resolved, &client, &output.field_name_mapping).await?;

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        runtime.create_dir_all(parent)?;
    }
    runtime.write(&output_path, content.as_bytes())?;

    println!("\nDone! Generated {} interface(s).", resolved.len());
    println!("Output: {}\n", output_path.display());

    Ok(GenerateOutcome::Written {
        path: output_path,
        interfaces: resolved.len(),
    })
}
