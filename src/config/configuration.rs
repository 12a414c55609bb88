use crate::error::{ConfigError, Result};
use crate::value::units::duration_to_value;
use crate::value::{Table, Value, parse_byte_size, parse_duration, split_path};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

/// Outcome of walking a path through one tree.
#[derive(Debug)]
enum Lookup<T> {
	Found(T),
	/// Every node on the way was a table, but a segment is absent.
	Missing,
	/// A scalar or list stands where the path needs a table. It hides the
	/// whole sub-tree from every tree beneath it.
	Shadowed,
}

impl<T> Lookup<T> {
	fn found(self) -> Option<T> {
		match self {
			Lookup::Found(value) => Some(value),
			Lookup::Missing | Lookup::Shadowed => None,
		}
	}
}

fn walk<'a, 'p>(root: &'a Value, path: impl IntoIterator<Item = &'p str>) -> Lookup<&'a Value> {
	let mut node = root;
	for segment in path {
		let Some(table) = node.as_table() else {
			return Lookup::Shadowed;
		};
		match table.get(segment) {
			Some(child) => node = child,
			None => return Lookup::Missing,
		}
	}
	Lookup::Found(node)
}

/// One concrete settings tree, seen from `scope` downwards.
#[derive(Debug, Clone)]
struct Layer {
	root: Arc<Value>,
	scope: Arc<[String]>,
}

impl Layer {
	fn resolve(&self, segments: &[&str]) -> Lookup<&Value> {
		walk(
			&self.root,
			self.scope
				.iter()
				.map(String::as_str)
				.chain(segments.iter().copied()),
		)
	}

	fn same_view(&self, other: &Layer) -> bool {
		Arc::ptr_eq(&self.root, &other.root) && self.scope == other.scope
	}
}

/// Defaults registered by reads that supplied one, seen from `scope` downwards.
#[derive(Debug, Clone)]
struct Defaults {
	table: Arc<RwLock<Value>>,
	scope: Arc<[String]>,
}

impl Defaults {
	fn new() -> Self {
		Defaults {
			table: Arc::new(RwLock::new(Value::Table(Table::new()))),
			scope: Arc::from(Vec::<String>::new()),
		}
	}

	fn resolve(&self, segments: &[&str]) -> Lookup<Value> {
		let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
		match walk(
			&table,
			self.scope
				.iter()
				.map(String::as_str)
				.chain(segments.iter().copied()),
		) {
			Lookup::Found(value) => Lookup::Found(value.clone()),
			Lookup::Missing => Lookup::Missing,
			Lookup::Shadowed => Lookup::Shadowed,
		}
	}

	fn register(&self, segments: &[&str], value: Value) {
		let full: Vec<&str> = self
			.scope
			.iter()
			.map(String::as_str)
			.chain(segments.iter().copied())
			.collect();
		let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
		table.insert(full.as_slice(), value);
	}

	fn same_view(&self, other: &Defaults) -> bool {
		Arc::ptr_eq(&self.table, &other.table) && self.scope == other.scope
	}
}

fn scoped(scope: &[String], segments: &[&str]) -> Arc<[String]> {
	scope
		.iter()
		.cloned()
		.chain(segments.iter().map(|s| s.to_string()))
		.collect()
}

/// A read-only, typed view over one or more layered settings trees.
///
/// Lookups consult the concrete layers in precedence order, then any
/// defaults registered by earlier reads. A scalar or list in one layer
/// hides everything beneath its path in the layers and defaults below it,
/// so reads, structural queries and rendering all agree on one merged
/// tree. Reads never fail: a missing path
/// yields the supplied default or the type's zero value, and a value that
/// cannot be coerced to the requested type yields the zero value.
///
/// Cloning is cheap; clones and sub-views share the underlying trees.
#[derive(Debug, Clone)]
pub struct Configuration {
	layers: Vec<Layer>,
	/// The first entry is this view's own defaults; the rest come from fallbacks.
	defaults: Vec<Defaults>,
}

impl Default for Configuration {
	fn default() -> Self {
		Self::empty()
	}
}

impl Configuration {
	/// The empty configuration. Every accessor behaves as for an empty tree.
	pub fn empty() -> Self {
		Configuration {
			layers: Vec::new(),
			defaults: vec![Defaults::new()],
		}
	}

	/// Wrap a settings table. An empty table gives the empty configuration.
	pub fn from_table(table: Table) -> Self {
		let mut configuration = Self::empty();
		if !table.is_empty() {
			configuration.layers.push(Layer {
				root: Arc::new(Value::Table(table)),
				scope: Arc::from(Vec::<String>::new()),
			});
		}
		configuration
	}

	// =========================================================================
	// Composition
	// =========================================================================

	/// Compose `self` over `fallback`.
	///
	/// The result answers every path from `self` first and `fallback` second,
	/// recursively through sub-tables. Anything that resolves to a
	/// configuration can be passed, including the `Config` facade. Layers
	/// already present in `self` are not added again, so repeating a
	/// composition does not change the result.
	pub fn with_fallback(&self, fallback: impl AsRef<Configuration>) -> Configuration {
		let fallback = fallback.as_ref();
		let mut merged = self.clone();

		for layer in &fallback.layers {
			if !merged.layers.iter().any(|existing| existing.same_view(layer)) {
				merged.layers.push(layer.clone());
			}
		}
		for defaults in &fallback.defaults {
			if !merged
				.defaults
				.iter()
				.any(|existing| existing.same_view(defaults))
			{
				merged.defaults.push(defaults.clone());
			}
		}

		merged
	}

	/// The sub-tree rooted at `path`, as its own configuration.
	///
	/// The view shares storage with `self`. Layers where `path` is absent
	/// drop out. The first layer holding anything other than a table there
	/// hides the layers and defaults below it, and the view then keeps
	/// defaults of its own. When no layer remains the result behaves as empty.
	pub fn get_config(&self, path: &str) -> Configuration {
		let Some(segments) = split_path(path) else {
			return Self::empty();
		};

		let mut layers = Vec::new();
		let mut shadowed = false;
		for layer in &self.layers {
			match layer.resolve(&segments) {
				Lookup::Found(Value::Table(_)) => layers.push(Layer {
					root: Arc::clone(&layer.root),
					scope: scoped(&layer.scope, &segments),
				}),
				Lookup::Missing => {}
				Lookup::Found(_) | Lookup::Shadowed => {
					shadowed = true;
					break;
				}
			}
		}

		// Defaults sit below every layer, so a shadowing layer hides them too
		if shadowed {
			return Configuration {
				layers,
				defaults: vec![Defaults::new()],
			};
		}

		let defaults = self
			.defaults
			.iter()
			.map(|defaults| Defaults {
				table: Arc::clone(&defaults.table),
				scope: scoped(&defaults.scope, &segments),
			})
			.collect();

		Configuration { layers, defaults }
	}

	// =========================================================================
	// Structural queries
	// =========================================================================

	/// True iff a concrete value (not a registered default) exists at `path`.
	pub fn has_path(&self, path: &str) -> bool {
		split_path(path).is_some_and(|segments| {
			matches!(self.resolve_concrete(&segments), Lookup::Found(_))
		})
	}

	/// Sorted top-level keys of the merged concrete view.
	pub fn keys(&self) -> Vec<String> {
		let mut keys = BTreeSet::new();
		for layer in &self.layers {
			if let Lookup::Found(Value::Table(table)) = layer.resolve(&[]) {
				keys.extend(table.keys().cloned());
			}
		}
		keys.into_iter().collect()
	}

	/// True iff no concrete settings are reachable through any layer.
	pub fn is_empty(&self) -> bool {
		self.layers.iter().all(|layer| {
			layer
				.resolve(&[])
				.found()
				.and_then(Value::as_table)
				.is_none_or(Table::is_empty)
		})
	}

	pub fn is_object(&self, path: &str) -> bool {
		matches!(self.get_value(path), Some(Value::Table(_)))
	}

	pub fn is_array(&self, path: &str) -> bool {
		matches!(self.get_value(path), Some(Value::List(_)))
	}

	// =========================================================================
	// Raw access
	// =========================================================================

	/// The resolved value at `path`: the first concrete layer holding it,
	/// otherwise the first registered default.
	pub fn get_value(&self, path: &str) -> Option<Value> {
		split_path(path).and_then(|segments| self.resolve(&segments))
	}

	fn resolve(&self, segments: &[&str]) -> Option<Value> {
		match self.resolve_concrete(segments) {
			Lookup::Found(value) => Some(value.clone()),
			Lookup::Shadowed => None,
			Lookup::Missing => self.resolve_default(segments),
		}
	}

	/// First concrete layer that holds `segments` or hides it.
	fn resolve_concrete(&self, segments: &[&str]) -> Lookup<&Value> {
		for layer in &self.layers {
			match layer.resolve(segments) {
				Lookup::Missing => {}
				decided => return decided,
			}
		}
		Lookup::Missing
	}

	fn resolve_default(&self, segments: &[&str]) -> Option<Value> {
		for defaults in &self.defaults {
			match defaults.resolve(segments) {
				Lookup::Found(value) => return Some(value),
				Lookup::Shadowed => return None,
				Lookup::Missing => {}
			}
		}
		None
	}

	fn register_default(&self, segments: &[&str], value: Value) {
		if let Some(own) = self.defaults.first() {
			own.register(segments, value);
		}
	}

	/// The whole resolved tree, defaults included.
	fn merged(&self) -> Value {
		let mut merged = Value::Table(Table::new());
		for layer in &self.layers {
			if let Lookup::Found(tree) = layer.resolve(&[]) {
				merged.merge_from(tree);
			}
		}
		for defaults in &self.defaults {
			if let Lookup::Found(tree) = defaults.resolve(&[]) {
				merged.merge_from(&tree);
			}
		}
		merged
	}

	/// Deserialize the whole resolved tree into `T`.
	pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
		toml::Value::from(&self.merged())
			.try_into()
			.map_err(|source| ConfigError::Deserialize {
				target: std::any::type_name::<T>(),
				source,
			})
	}

	// =========================================================================
	// Typed reads
	// =========================================================================

	fn read<T>(
		&self,
		path: &str,
		default: Option<T>,
		to_value: impl Fn(T) -> Value,
		coerce: impl Fn(&Value) -> Option<T>,
	) -> T
	where
		T: Clone + Default,
	{
		let Some(segments) = split_path(path) else {
			return default.unwrap_or_default();
		};

		if let Some(ref default) = default {
			self.register_default(&segments, to_value(default.clone()));
		}

		// A supplied default is the answer whenever no concrete value exists
		let value = match self.resolve_concrete(&segments) {
			Lookup::Found(value) => value.clone(),
			Lookup::Shadowed => return default.unwrap_or_default(),
			Lookup::Missing => match default {
				Some(default) => return default,
				None => match self.resolve_default(&segments) {
					Some(value) => value,
					None => return T::default(),
				},
			},
		};

		coerce(&value).unwrap_or_else(|| {
			debug!(
				path,
				found = value.type_name(),
				wanted = std::any::type_name::<T>(),
				"Config value not coercible, using zero value"
			);
			T::default()
		})
	}

	fn read_list<T: Default>(&self, path: &str, coerce: impl Fn(&Value) -> Option<T>) -> Vec<T> {
		match self.get_value(path) {
			Some(Value::List(items)) => items
				.iter()
				.map(|item| {
					coerce(item).unwrap_or_else(|| {
						debug!(
							path,
							found = item.type_name(),
							"Config list element not coercible, using zero value"
						);
						T::default()
					})
				})
				.collect(),
			Some(other) => {
				debug!(path, found = other.type_name(), "Config value is not a list");
				Vec::new()
			}
			None => Vec::new(),
		}
	}

	pub fn get_boolean(&self, path: &str, default: Option<bool>) -> bool {
		self.read(path, default, Value::from, Value::as_bool)
	}

	pub fn get_int32(&self, path: &str, default: Option<i32>) -> i32 {
		self.read(path, default, Value::from, Value::as_i32)
	}

	pub fn get_int64(&self, path: &str, default: Option<i64>) -> i64 {
		self.read(path, default, Value::from, Value::as_i64)
	}

	pub fn get_float32(&self, path: &str, default: Option<f32>) -> f32 {
		self.read(path, default, Value::from, Value::as_f32)
	}

	pub fn get_float64(&self, path: &str, default: Option<f64>) -> f64 {
		self.read(path, default, Value::from, Value::as_f64)
	}

	pub fn get_string(&self, path: &str, default: Option<&str>) -> String {
		self.read(
			path,
			default.map(str::to_string),
			Value::from,
			Value::as_string,
		)
	}

	/// Read a duration. The "infinite" sentinel yields [`INFINITE_DURATION`].
	///
	/// [`INFINITE_DURATION`]: crate::value::INFINITE_DURATION
	pub fn get_time_duration(&self, path: &str, default: Option<Duration>) -> Duration {
		self.read(path, default, duration_to_value, |value| {
			parse_duration(value, true)
		})
	}

	/// Read a duration where "infinite" is not an acceptable answer.
	///
	/// The sentinel is an ordinary (invalid) value here, so it reads as
	/// `Duration::ZERO` like any other uncoercible value.
	pub fn get_time_duration_infinite_not_allowed(
		&self,
		path: &str,
		default: Option<Duration>,
	) -> Duration {
		self.read(path, default, duration_to_value, |value| {
			parse_duration(value, false)
		})
	}

	/// Bytes at `path`; `None` when missing or unparsable.
	pub fn get_byte_size(&self, path: &str) -> Option<u128> {
		self.get_value(path).as_ref().and_then(parse_byte_size)
	}

	pub fn get_boolean_list(&self, path: &str) -> Vec<bool> {
		self.read_list(path, Value::as_bool)
	}

	pub fn get_int32_list(&self, path: &str) -> Vec<i32> {
		self.read_list(path, Value::as_i32)
	}

	pub fn get_int64_list(&self, path: &str) -> Vec<i64> {
		self.read_list(path, Value::as_i64)
	}

	pub fn get_float32_list(&self, path: &str) -> Vec<f32> {
		self.read_list(path, Value::as_f32)
	}

	pub fn get_float64_list(&self, path: &str) -> Vec<f64> {
		self.read_list(path, Value::as_f64)
	}

	pub fn get_byte_list(&self, path: &str) -> Vec<u8> {
		self.read_list(path, Value::as_u8)
	}

	pub fn get_string_list(&self, path: &str) -> Vec<String> {
		self.read_list(path, Value::as_string)
	}
}

impl AsRef<Configuration> for Configuration {
	fn as_ref(&self) -> &Configuration {
		self
	}
}

impl From<Table> for Configuration {
	fn from(table: Table) -> Self {
		Self::from_table(table)
	}
}

impl From<toml::Table> for Configuration {
	fn from(table: toml::Table) -> Self {
		Self::from_table(
			table
				.into_iter()
				.map(|(key, value)| (key, Value::from(value)))
				.collect(),
		)
	}
}

/// Renders the resolved tree as TOML, for diagnostics only.
impl fmt::Display for Configuration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let merged = self.merged();
		match toml::to_string(&toml::Value::from(&merged)) {
			Ok(rendered) => f.write_str(&rendered),
			Err(_) => write!(f, "{merged:?}"),
		}
	}
}
