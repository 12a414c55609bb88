use std::path::PathBuf;

/// Library-level structured errors for layerconf.
///
/// Accessors never return these; they surface only from the fallible
/// provider entry points and from [`Configuration::deserialize`].
///
/// [`Configuration::deserialize`]: crate::config::Configuration::deserialize
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Config file not found: {path}")]
	NotFound { path: PathBuf },

	#[error("Failed to read config file: {path}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse config source: {origin}")]
	Parse {
		origin: String,
		#[source]
		source: toml::de::Error,
	},

	#[error("Failed to deserialize configuration into {target}")]
	Deserialize {
		target: &'static str,
		#[source]
		source: toml::de::Error,
	},

	#[error("Failed to resolve home directory")]
	HomeDirectoryNotFound,
}

/// Result type alias using ConfigError.
pub type Result<T> = std::result::Result<T, ConfigError>;
