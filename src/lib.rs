//! Layerconf - typed, layered configuration access.
//!
//! This library provides:
//! - A read-only `Configuration` view with typed getters over dotted paths
//! - Fallback composition: the first layer holding a path wins
//! - A `Config` facade resolving a file, inline text and an injected
//!   configuration into one view
//! - A pluggable `ConfigurationProvider`, with TOML as the default
//!
//! Reads never fail. Missing paths give the supplied default or the type's
//! zero value; load and parse failures are logged and degrade to empty data.
//!
//! # Example
//!
//! ```no_run
//! use layerconf::config::{Config, config_file, config_string};
//!
//! let config = Config::new([
//!     config_file("configs/server"),
//!     config_string("[server]\nport = 8080\ntimeout = \"30s\""),
//! ]);
//!
//! let port = config.get_int32("server.port", Some(80));
//! let timeout = config.get_time_duration("server.timeout", None);
//! let server = config.get_config("server");
//!
//! println!("{port} {timeout:?} {:?}", server.keys());
//! ```

pub mod config;
pub mod error;
pub mod provider;
pub mod value;

pub use config::{Config, Configuration};
pub use error::{ConfigError, Result};
pub use provider::{ConfigurationProvider, TomlConfigProvider};
pub use value::{INFINITE_DURATION, Value};
