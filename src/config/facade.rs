use crate::config::Configuration;
use crate::provider::{ConfigurationProvider, TomlConfigProvider};
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A construction-time option for [`Config`].
///
/// Options apply in the order given; a later option of the same kind
/// replaces an earlier one.
pub enum ConfigOption {
	/// Load this file through the provider.
	File(PathBuf),

	/// Parse this inline text through the provider.
	Inline(String),

	/// Use this configuration as the highest-precedence base.
	Configuration(Configuration),

	/// Use this provider instead of [`TomlConfigProvider`].
	Provider(Arc<dyn ConfigurationProvider>),
}

impl fmt::Debug for ConfigOption {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigOption::File(path) => f.debug_tuple("File").field(path).finish(),
			ConfigOption::Inline(content) => f.debug_tuple("Inline").field(content).finish(),
			ConfigOption::Configuration(config) => {
				f.debug_tuple("Configuration").field(config).finish()
			}
			ConfigOption::Provider(_) => f.write_str("Provider(..)"),
		}
	}
}

/// Load settings from the file at `path`.
pub fn config_file(path: impl Into<PathBuf>) -> ConfigOption {
	ConfigOption::File(path.into())
}

/// Parse settings from inline text.
pub fn config_string(content: impl Into<String>) -> ConfigOption {
	ConfigOption::Inline(content.into())
}

/// Start from an already-built configuration.
pub fn with_config(configuration: impl AsRef<Configuration>) -> ConfigOption {
	ConfigOption::Configuration(configuration.as_ref().clone())
}

/// Replace the default provider.
pub fn config_provider(provider: impl ConfigurationProvider + 'static) -> ConfigOption {
	ConfigOption::Provider(Arc::new(provider))
}

/// Collects options before a [`Config`] is resolved.
#[derive(Default)]
pub struct ConfigBuilder {
	config_file: Option<PathBuf>,
	config_string: Option<String>,
	configuration: Option<Configuration>,
	provider: Option<Arc<dyn ConfigurationProvider>>,
}

impl ConfigBuilder {
	pub fn option(mut self, option: ConfigOption) -> Self {
		match option {
			ConfigOption::File(path) => self.config_file = Some(path),
			ConfigOption::Inline(content) => self.config_string = Some(content),
			ConfigOption::Configuration(configuration) => self.configuration = Some(configuration),
			ConfigOption::Provider(provider) => self.provider = Some(provider),
		}
		self
	}

	pub fn config_file(self, path: impl Into<PathBuf>) -> Self {
		self.option(config_file(path))
	}

	pub fn config_string(self, content: impl Into<String>) -> Self {
		self.option(config_string(content))
	}

	pub fn configuration(self, configuration: impl AsRef<Configuration>) -> Self {
		self.option(with_config(configuration))
	}

	pub fn provider(self, provider: impl ConfigurationProvider + 'static) -> Self {
		self.option(config_provider(provider))
	}

	/// Resolve every source into one configuration.
	///
	/// Precedence is fixed regardless of option order:
	/// injected configuration > file > inline text.
	pub fn build(self) -> Config {
		let provider = self
			.provider
			.unwrap_or_else(|| Arc::new(TomlConfigProvider));

		let mut resolved = self
			.configuration
			.unwrap_or_else(|| provider.parse_string(""));

		// Empty sources are treated as absent.
		let config_file = self.config_file.filter(|path| !path.as_os_str().is_empty());
		let config_string = self.config_string.filter(|content| !content.is_empty());

		if let Some(ref path) = config_file {
			debug!(path = %path.display(), "Layering config file");
			resolved = resolved.with_fallback(provider.load_config(path));
		}

		if let Some(ref content) = config_string {
			debug!(bytes = content.len(), "Layering inline config");
			resolved = resolved.with_fallback(provider.parse_string(content));
		}

		Config {
			config_file,
			config_string,
			resolved,
			provider,
		}
	}
}

/// The composed view over every configured source.
///
/// Dereferences to its resolved [`Configuration`], so every accessor is
/// available directly on the facade. A `Config` is immutable once built.
#[derive(Clone)]
pub struct Config {
	config_file: Option<PathBuf>,
	config_string: Option<String>,
	resolved: Configuration,
	provider: Arc<dyn ConfigurationProvider>,
}

impl Config {
	/// Build a config from options applied in order.
	///
	/// # Example
	///
	/// ```
	/// use layerconf::config::{Config, config_string};
	///
	/// let config = Config::new([config_string("[server]\nport = 8080")]);
	/// assert_eq!(config.get_int32("server.port", None), 8080);
	/// assert_eq!(config.get_string("server.host", Some("localhost")), "localhost");
	/// ```
	pub fn new(options: impl IntoIterator<Item = ConfigOption>) -> Self {
		options
			.into_iter()
			.fold(Self::builder(), ConfigBuilder::option)
			.build()
	}

	pub fn builder() -> ConfigBuilder {
		ConfigBuilder::default()
	}

	/// The canonical resolved configuration behind this facade.
	pub fn configuration(&self) -> &Configuration {
		&self.resolved
	}

	/// File source, kept for diagnostics.
	pub fn config_file(&self) -> Option<&Path> {
		self.config_file.as_deref()
	}

	/// Inline source, kept for diagnostics.
	pub fn config_string(&self) -> Option<&str> {
		self.config_string.as_deref()
	}

	pub fn provider(&self) -> &dyn ConfigurationProvider {
		&*self.provider
	}

	/// A new facade whose view falls back to `fallback`.
	///
	/// Passing another `Config` merges with its resolved configuration.
	pub fn with_fallback(&self, fallback: impl AsRef<Configuration>) -> Config {
		Config {
			resolved: self.resolved.with_fallback(fallback),
			..self.clone()
		}
	}
}

impl Default for Config {
	fn default() -> Self {
		Self::builder().build()
	}
}

impl Deref for Config {
	type Target = Configuration;

	fn deref(&self) -> &Configuration {
		&self.resolved
	}
}

impl AsRef<Configuration> for Config {
	fn as_ref(&self) -> &Configuration {
		&self.resolved
	}
}

impl fmt::Display for Config {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.resolved, f)
	}
}

impl fmt::Debug for Config {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Config")
			.field("config_file", &self.config_file)
			.field("config_string", &self.config_string)
			.field("resolved", &self.resolved)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	/// Counts calls; loads answer with the requested source name.
	#[derive(Default)]
	struct CountingProvider {
		loads: AtomicUsize,
		parses: AtomicUsize,
	}

	impl ConfigurationProvider for CountingProvider {
		fn load_config(&self, source: &Path) -> Configuration {
			self.loads.fetch_add(1, Ordering::SeqCst);
			TomlConfigProvider.parse_string(&format!("source = {:?}", source.display().to_string()))
		}

		fn parse_string(&self, content: &str) -> Configuration {
			self.parses.fetch_add(1, Ordering::SeqCst);
			TomlConfigProvider.parse_string(content)
		}
	}

	#[test]
	fn test_no_sources_is_empty() {
		let config = Config::new([]);

		assert!(config.is_empty());
		assert!(config.config_file().is_none());
		assert!(config.config_string().is_none());
		assert_eq!(config.get_int32("anything", None), 0);
	}

	#[test]
	fn test_inline_only_matches_provider() {
		let source = "name = \"svc\"\n[server]\nport = 8080";
		let config = Config::new([config_string(source)]);
		let direct = TomlConfigProvider.parse_string(source);

		assert_eq!(config.keys(), direct.keys());
		assert_eq!(config.to_string(), direct.to_string());
		assert_eq!(config.config_string(), Some(source));
	}

	#[test]
	fn test_injected_configuration_beats_inline() {
		let injected = TomlConfigProvider.parse_string("port = 1");
		let config = Config::new([config_string("port = 2\nhost = \"h\""), with_config(&injected)]);

		assert_eq!(config.get_int32("port", None), 1);
		assert_eq!(config.get_string("host", None), "h");
	}

	#[test]
	fn test_later_option_replaces_earlier() {
		let config = Config::new([config_string("a = 1"), config_string("b = 2")]);

		assert!(!config.has_path("a"));
		assert_eq!(config.get_int32("b", None), 2);
	}

	#[test]
	fn test_custom_provider_is_used() {
		let provider = Arc::new(CountingProvider::default());
		let config = Config::new([
			ConfigOption::Provider(provider.clone()),
			config_file("app"),
			config_string("x = 1"),
		]);

		assert_eq!(config.get_string("source", None), "app");
		assert_eq!(config.get_int32("x", None), 1);
		assert_eq!(provider.loads.load(Ordering::SeqCst), 1);
		// Base parse of "" plus the inline source
		assert_eq!(provider.parses.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn test_injected_configuration_skips_base_parse() {
		let provider = Arc::new(CountingProvider::default());
		let _config = Config::new([
			ConfigOption::Provider(provider.clone()),
			with_config(Configuration::empty()),
		]);

		assert_eq!(provider.parses.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn test_empty_sources_are_ignored() {
		let provider = Arc::new(CountingProvider::default());
		let config = Config::new([
			ConfigOption::Provider(provider.clone()),
			config_file(""),
			config_string(""),
		]);

		assert!(config.is_empty());
		assert_eq!(provider.loads.load(Ordering::SeqCst), 0);
		assert_eq!(provider.parses.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_with_fallback_unwraps_facade() {
		let primary = Config::new([config_string("x = \"primary\"")]);
		let secondary = Config::new([config_string("x = \"secondary\"\ny = \"secondary\"")]);

		let merged = primary.with_fallback(&secondary);

		assert_eq!(merged.get_string("x", None), "primary");
		assert_eq!(merged.get_string("y", None), "secondary");
		// The primary facade is unchanged
		assert!(!primary.has_path("y"));
	}

	#[test]
	fn test_configuration_with_fallback_accepts_facade() {
		let base = TomlConfigProvider.parse_string("x = 1");
		let facade = Config::new([config_string("y = 2")]);

		let merged = base.with_fallback(&facade);

		assert_eq!(merged.get_int32("x", None), 1);
		assert_eq!(merged.get_int32("y", None), 2);
	}

	#[test]
	fn test_builder_matches_options() {
		let config = Config::builder()
			.config_string("port = 2")
			.configuration(TomlConfigProvider.parse_string("port = 1"))
			.provider(TomlConfigProvider)
			.build();

		assert_eq!(config.get_int32("port", None), 1);
	}

	fn assert_send_sync<T: Send + Sync>() {}

	#[test]
	fn test_config_is_send_and_sync() {
		assert_send_sync::<Config>();
		assert_send_sync::<ConfigBuilder>();
	}

	#[test]
	fn test_shared_config_across_threads() {
		let config = Config::new([config_string("[pool]\nsize = 4")]);

		std::thread::scope(|scope| {
			for worker in 0..4i32 {
				let config = config.clone();
				scope.spawn(move || {
					assert_eq!(config.get_int32("pool.size", None), 4);
					config.get_int32(&format!("pool.worker{worker}"), Some(worker));
				});
			}
		});

		// Clones share one defaults table
		for worker in 0..4i32 {
			assert_eq!(config.get_int32(&format!("pool.worker{worker}"), None), worker);
		}
	}

	#[test]
	fn test_option_debug_hides_provider() {
		let rendered = format!("{:?}", config_provider(TomlConfigProvider));
		assert_eq!(rendered, "Provider(..)");
	}
}
