use crate::config::Configuration;
use crate::error::{ConfigError, Result};
use crate::provider::ConfigurationProvider;
use std::error::Error as _;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extension appended to sources named without one.
pub const DEFAULT_EXTENSION: &str = "toml";

/// Infix marking the base file loaded underneath a source.
pub const BASE_FILE_INFIX: &str = "default";

/// The default provider, backed by TOML.
///
/// `load_config("configs/app")` reads `configs/app.default.toml` as a base
/// and overlays `configs/app.toml` on top of it. A source that already
/// names a base file, such as `configs/app.default.toml`, is read alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlConfigProvider;

impl ConfigurationProvider for TomlConfigProvider {
	fn load_config(&self, source: &Path) -> Configuration {
		let (main_path, base_path) = match source_paths(source) {
			Ok(paths) => paths,
			Err(e) => {
				warn!(source = %source.display(), error = %describe(&e), "Cannot resolve config source");
				return Configuration::empty();
			}
		};

		let base = match base_path.as_deref().map(try_load_file) {
			None => Configuration::empty(),
			Some(Ok(config)) => config,
			Some(Err(ConfigError::NotFound { path })) => {
				debug!(path = %path.display(), "No base config file");
				Configuration::empty()
			}
			Some(Err(e)) => {
				warn!(error = %describe(&e), "Failed to load base config");
				Configuration::empty()
			}
		};

		let main = try_load_file(&main_path).unwrap_or_else(|e| {
			warn!(error = %describe(&e), "Failed to load config");
			Configuration::empty()
		});

		main.with_fallback(&base)
	}

	fn parse_string(&self, content: &str) -> Configuration {
		try_parse_str(content, "<inline>").unwrap_or_else(|e| {
			warn!(error = %describe(&e), "Failed to parse inline config");
			Configuration::empty()
		})
	}
}

/// Parse TOML text. `origin` names the source in errors.
pub fn try_parse_str(content: &str, origin: &str) -> Result<Configuration> {
	if content.trim().is_empty() {
		return Ok(Configuration::empty());
	}

	let table: toml::Table = toml::from_str(content).map_err(|source| ConfigError::Parse {
		origin: origin.to_string(),
		source,
	})?;

	Ok(Configuration::from(table))
}

/// Read and parse one TOML file.
pub fn try_load_file(path: &Path) -> Result<Configuration> {
	let content = std::fs::read_to_string(path).map_err(|source| {
		if source.kind() == std::io::ErrorKind::NotFound {
			ConfigError::NotFound {
				path: path.to_path_buf(),
			}
		} else {
			ConfigError::Read {
				path: path.to_path_buf(),
				source,
			}
		}
	})?;

	debug!(path = %path.display(), "Loaded config file");
	try_parse_str(&content, &path.display().to_string())
}

/// Resolve a source name into its main file path and, unless the source is
/// itself a base file, the base file path beneath it.
fn source_paths(source: &Path) -> Result<(PathBuf, Option<PathBuf>)> {
	let main = expand_home(source)?;
	let main = if main.extension().is_some() {
		main
	} else {
		main.with_extension(DEFAULT_EXTENSION)
	};

	let stem = main
		.file_stem()
		.map(|s| s.to_string_lossy().into_owned())
		.unwrap_or_default();
	if Path::new(&stem)
		.extension()
		.is_some_and(|infix| infix == BASE_FILE_INFIX)
	{
		return Ok((main, None));
	}

	let extension = main
		.extension()
		.map(|s| s.to_string_lossy().into_owned())
		.unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
	let base = main.with_file_name(format!("{stem}.{BASE_FILE_INFIX}.{extension}"));

	Ok((main, Some(base)))
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(path: &Path) -> Result<PathBuf> {
	match path.strip_prefix("~") {
		Ok(rest) => {
			let home = dirs::home_dir().ok_or(ConfigError::HomeDirectoryNotFound)?;
			Ok(home.join(rest))
		}
		Err(_) => Ok(path.to_path_buf()),
	}
}

/// Error message with its source chain, for diagnostics.
fn describe(error: &ConfigError) -> String {
	let mut message = error.to_string();
	let mut source = error.source();
	while let Some(cause) = source {
		message.push_str(": ");
		message.push_str(&cause.to_string());
		source = cause.source();
	}
	message
}
