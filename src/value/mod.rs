//! Settings tree values and the loose coercion rules typed reads rely on.
//!
//! This module handles:
//! - The `Value` tree every provider converts its format into
//! - Dotted path splitting and lookup
//! - Scalar coercions (numeric strings, boolean words, int/float widening)
//! - Duration and byte-size notations (see [`units`])

pub mod units;

use std::collections::BTreeMap;

pub use units::{INFINITE_DURATION, parse_byte_size, parse_duration};

/// A nested table of settings, keyed by path segment.
pub type Table = BTreeMap<String, Value>;

/// A single node in a configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Boolean(bool),
	Integer(i64),
	Float(f64),
	String(String),
	List(Vec<Value>),
	Table(Table),
}

/// Split a dotted path into its segments.
///
/// Returns `None` for the empty path and for paths with empty segments
/// (`"a..b"`, `".a"`, `"a."`). Segments are case-sensitive.
pub fn split_path(path: &str) -> Option<Vec<&str>> {
	if path.is_empty() {
		return None;
	}

	let segments: Vec<&str> = path.split('.').collect();
	if segments.iter().any(|segment| segment.is_empty()) {
		return None;
	}

	Some(segments)
}

impl Value {
	/// Short name of the variant, for diagnostics.
	pub fn type_name(&self) -> &'static str {
		match self {
			Value::Boolean(_) => "boolean",
			Value::Integer(_) => "integer",
			Value::Float(_) => "float",
			Value::String(_) => "string",
			Value::List(_) => "list",
			Value::Table(_) => "table",
		}
	}

	pub fn as_table(&self) -> Option<&Table> {
		match self {
			Value::Table(table) => Some(table),
			_ => None,
		}
	}

	/// Walk `segments` through nested tables.
	pub fn lookup<'a, S: AsRef<str>>(
		&'a self,
		segments: impl IntoIterator<Item = S>,
	) -> Option<&'a Value> {
		let mut node = self;
		for segment in segments {
			node = node.as_table()?.get(segment.as_ref())?;
		}
		Some(node)
	}

	/// Set `value` at `segments`, creating intermediate tables.
	///
	/// Any scalar or list standing where a table is needed is replaced.
	pub fn insert<S: AsRef<str>>(&mut self, segments: &[S], value: Value) {
		let Some((last, parents)) = segments.split_last() else {
			*self = value;
			return;
		};

		let mut table = ensure_table(self);
		for segment in parents {
			let child = table
				.entry(segment.as_ref().to_string())
				.or_insert_with(|| Value::Table(Table::new()));
			table = ensure_table(child);
		}
		table.insert(last.as_ref().to_string(), value);
	}

	/// Fill everything absent from `self` with the contents of `lower`.
	///
	/// Tables merge recursively; for any other pairing `self` wins.
	pub fn merge_from(&mut self, lower: &Value) {
		let (Value::Table(upper), Value::Table(lower)) = (self, lower) else {
			return;
		};

		for (key, lower_value) in lower {
			match upper.get_mut(key) {
				Some(existing) => existing.merge_from(lower_value),
				None => {
					upper.insert(key.clone(), lower_value.clone());
				}
			}
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Boolean(b) => Some(*b),
			Value::Integer(0) => Some(false),
			Value::Integer(1) => Some(true),
			Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
				"true" | "yes" | "on" | "1" => Some(true),
				"false" | "no" | "off" | "0" => Some(false),
				_ => None,
			},
			_ => None,
		}
	}

	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Value::Integer(i) => Some(*i),
			Value::Float(f) => float_to_i64(*f),
			Value::String(s) => {
				let s = s.trim();
				s.parse::<i64>()
					.ok()
					.or_else(|| s.parse::<f64>().ok().and_then(float_to_i64))
			}
			_ => None,
		}
	}

	pub fn as_i32(&self) -> Option<i32> {
		self.as_i64().and_then(|i| i32::try_from(i).ok())
	}

	pub fn as_u8(&self) -> Option<u8> {
		self.as_i64().and_then(|i| u8::try_from(i).ok())
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Float(f) => Some(*f),
			Value::Integer(i) => Some(*i as f64),
			Value::String(s) => s.trim().parse::<f64>().ok(),
			_ => None,
		}
	}

	pub fn as_f32(&self) -> Option<f32> {
		let wide = self.as_f64()?;
		let narrow = wide as f32;
		// Finite values beyond f32 range do not fit.
		if wide.is_finite() && narrow.is_infinite() {
			return None;
		}
		Some(narrow)
	}

	/// Render a scalar as a string. Lists and tables do not coerce.
	pub fn as_string(&self) -> Option<String> {
		match self {
			Value::String(s) => Some(s.clone()),
			Value::Boolean(b) => Some(b.to_string()),
			Value::Integer(i) => Some(i.to_string()),
			Value::Float(f) => Some(f.to_string()),
			Value::List(_) | Value::Table(_) => None,
		}
	}
}

fn ensure_table(node: &mut Value) -> &mut Table {
	if !matches!(node, Value::Table(_)) {
		*node = Value::Table(Table::new());
	}
	match node {
		Value::Table(table) => table,
		_ => unreachable!("node was just replaced with a table"),
	}
}

fn float_to_i64(f: f64) -> Option<i64> {
	if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
		Some(f as i64)
	} else {
		None
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Boolean(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Value::Integer(i64::from(value))
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Integer(value)
	}
}

impl From<f32> for Value {
	fn from(value: f32) -> Self {
		Value::Float(f64::from(value))
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Float(value)
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::String(value)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::String(value.to_string())
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(values: Vec<T>) -> Self {
		Value::List(values.into_iter().map(Into::into).collect())
	}
}

impl From<Table> for Value {
	fn from(table: Table) -> Self {
		Value::Table(table)
	}
}

impl From<toml::Value> for Value {
	fn from(value: toml::Value) -> Self {
		match value {
			toml::Value::Boolean(b) => Value::Boolean(b),
			toml::Value::Integer(i) => Value::Integer(i),
			toml::Value::Float(f) => Value::Float(f),
			toml::Value::String(s) => Value::String(s),
			// Datetimes keep their textual form.
			toml::Value::Datetime(dt) => Value::String(dt.to_string()),
			toml::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
			toml::Value::Table(table) => Value::Table(
				table
					.into_iter()
					.map(|(key, value)| (key, Value::from(value)))
					.collect(),
			),
		}
	}
}

impl From<&Value> for toml::Value {
	fn from(value: &Value) -> Self {
		match value {
			Value::Boolean(b) => toml::Value::Boolean(*b),
			Value::Integer(i) => toml::Value::Integer(*i),
			Value::Float(f) => toml::Value::Float(*f),
			Value::String(s) => toml::Value::String(s.clone()),
			Value::List(items) => toml::Value::Array(items.iter().map(toml::Value::from).collect()),
			Value::Table(table) => toml::Value::Table(
				table
					.iter()
					.map(|(key, value)| (key.clone(), toml::Value::from(value)))
					.collect(),
			),
		}
	}
}
