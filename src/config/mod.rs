//! Configuration access and composition.
//!
//! This module handles:
//! - Typed reads with default registration over a layered settings tree
//! - Fallback composition between configurations
//! - The `Config` facade that resolves construction options into one view

pub mod configuration;
pub mod facade;

pub use configuration::Configuration;
pub use facade::{
	Config, ConfigBuilder, ConfigOption, config_file, config_provider, config_string, with_config,
};
