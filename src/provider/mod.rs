//! Pluggable sources of configuration.
//!
//! A provider turns a named source or inline text into a [`Configuration`].
//! Both entry points are infallible: failures are reported as diagnostics
//! and degrade to whatever could be loaded, possibly nothing.

pub mod toml_provider;

use crate::config::Configuration;
use std::path::Path;

pub use toml_provider::{TomlConfigProvider, try_load_file, try_parse_str};

/// Converts sources into configurations.
pub trait ConfigurationProvider: Send + Sync {
	/// Load the configuration named by `source`.
	fn load_config(&self, source: &Path) -> Configuration;

	/// Parse inline text. Empty text yields the empty configuration.
	fn parse_string(&self, content: &str) -> Configuration;
}
