//! Disambiguation of content types found in more than one list.

use std::fmt;

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::SpList;
use crate::runtime::Runtime;

/// How to pick among several lists carrying the same content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStrategy {
    /// Ask on the terminal.
    #[default]
    Interactive,
    /// Take the first candidate.
    First,
    /// Fail and ask for a `listId`/`listName`.
    Error,
    /// Take every candidate.
    All,
}

impl SelectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::First => "first",
            Self::Error => "error",
            Self::All => "all",
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local resolution failures. Service failures stay [`crate::http::GraphError`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("List \"{list_name}\" not found in site \"{site_id}\"")]
    ListNotFound { list_name: String, site_id: String },

    #[error("Content type \"{content_type}\" not found in any list of site \"{site_id}\"")]
    ContentTypeNotFound {
        content_type: String,
        site_id: String,
    },

    #[error(
        "Content type \"{content_type}\" found in {count} lists. Please specify listId or listName in config, or use --strategy=all"
    )]
    AmbiguousMatch { content_type: String, count: usize },

    #[error("Invalid selection for content type \"{content_type}\": {reason}")]
    InvalidSelection {
        content_type: String,
        reason: String,
    },
}

/// A candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListInfo {
    pub id: String,
    pub display_name: String,
    pub name: String,
}

impl From<&SpList> for ListInfo {
    fn from(list: &SpList) -> Self {
        Self {
            id: list.id.clone(),
            display_name: list.display_name.clone(),
            name: list.name.clone(),
        }
    }
}

/// A chosen list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSelection {
    pub list_id: String,
    pub list_name: String,
}

impl From<&ListInfo> for ListSelection {
    fn from(list: &ListInfo) -> Self {
        Self {
            list_id: list.id.clone(),
            list_name: list.display_name.clone(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait SelectionPolicy: Send + Sync {
    /// Picks zero or more of `candidates`. An empty result means skip.
    fn select(
        &self,
        content_type_name: &str,
        candidates: &[ListInfo],
        strategy: SelectionStrategy,
    ) -> Result<Vec<ListSelection>>;
}

/// Applies the strategies, prompting through the runtime for `interactive`.
pub struct PromptSelectionPolicy<'a, R: Runtime> {
    runtime: &'a R,
}

impl<'a, R: Runtime> PromptSelectionPolicy<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime }
    }

    fn prompt(
        &self,
        content_type_name: &str,
        candidates: &[ListInfo],
    ) -> Result<Vec<ListSelection>> {
        let mut choices: Vec<String> = candidates
            .iter()
            .map(|list| format!("{} ({})", list.display_name, list.id))
            .collect();
        choices.push("ALL (generate types for every list)".to_string());
        choices.push("Skip".to_string());

        let prompt = format!(
            "Content type \"{}\" found in {} lists. Which one should be used?",
            content_type_name,
            candidates.len()
        );
        let index = self
            .runtime
            .select(&prompt, &choices)
            .map_err(|e| ResolveError::InvalidSelection {
                content_type: content_type_name.to_string(),
                reason: format!("{:#}", e),
            })?;

        let count = candidates.len();
        match index {
            i if i < count => Ok(vec![ListSelection::from(&candidates[i])]),
            i if i == count => Ok(candidates.iter().map(ListSelection::from).collect()),
            i if i == count + 1 => Ok(Vec::new()),
            i => Err(ResolveError::InvalidSelection {
                content_type: content_type_name.to_string(),
                reason: format!("choice {} is out of range", i + 1),
            }
            .into()),
        }
    }
}

impl<R: Runtime> SelectionPolicy for PromptSelectionPolicy<'_, R> {
    fn select(
        &self,
        content_type_name: &str,
        candidates: &[ListInfo],
        strategy: SelectionStrategy,
    ) -> Result<Vec<ListSelection>> {
        let Some(first) = candidates.first() else {
            return Ok(Vec::new());
        };

        match strategy {
            SelectionStrategy::First => {
                println!(
                    "  Content type \"{}\" found in {} lists, using first: {}",
                    content_type_name,
                    candidates.len(),
                    first.display_name
                );
                Ok(vec![ListSelection::from(first)])
            }
            SelectionStrategy::Error => Err(ResolveError::AmbiguousMatch {
                content_type: content_type_name.to_string(),
                count: candidates.len(),
            }
            .into()),
            SelectionStrategy::All => Ok(candidates.iter().map(ListSelection::from).collect()),
            SelectionStrategy::Interactive => self.prompt(content_type_name, candidates),
        }
    }
}
