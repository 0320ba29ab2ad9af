//! Runtime abstraction for system operations.
//!
//! File access, environment lookups and terminal prompts go through [`Runtime`] so
//! the cache, the config loader and the selection prompt can be tested with mocks.
//!
//! # Structure
//!
//! - `env` - Environment variables
//! - `fs` - File system operations (read, write, directory)
//! - `user` - User interaction (numbered selection prompts)

mod env;
mod fs;
mod user;

use anyhow::Result;
use std::env as std_env;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;

    // File System
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;

    // User interaction
    /// Shows `choices` as a numbered menu and returns the zero-based index picked.
    /// An empty answer picks the first choice.
    fn select(&self, prompt: &str, choices: &[String]) -> Result<usize>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.write_impl(path, contents)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn select(&self, prompt: &str, choices: &[String]) -> Result<usize> {
        self.select_impl(prompt, choices)
    }
}
