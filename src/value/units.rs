use crate::value::Value;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Duration returned for the "no timeout" sentinel.
pub const INFINITE_DURATION: Duration = Duration::MAX;

static BYTE_SIZE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^\s*([0-9]+)(?:\.([0-9]+))?\s*([A-Za-z]*)\s*$").expect("byte size pattern is valid")
});

static NUMBER_UNIT_GAP: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"([0-9])\s+([A-Za-z])").expect("gap pattern is valid"));

/// Binary prefixes in ascending powers of 1024: (letter, SI name, IEC name).
const PREFIXES: [(&str, &str, &str); 8] = [
	("k", "kilo", "kibi"),
	("m", "mega", "mebi"),
	("g", "giga", "gibi"),
	("t", "tera", "tebi"),
	("p", "peta", "pebi"),
	("e", "exa", "exbi"),
	("z", "zetta", "zebi"),
	("y", "yotta", "yobi"),
];

/// Fraction digits beyond this are ignored.
const MAX_FRACTION_DIGITS: usize = 12;

/// Parse a byte size into a number of bytes.
///
/// Integers are bytes. Strings take a number with an optional unit; every
/// unit spelling (`k`, `kb`, `KiB`, `kilobytes`, ...) uses base 1024.
/// Fractional byte counts round to the nearest byte, halves upwards, for
/// floats and strings alike. Counts past `u128::MAX` are not sizes.
pub fn parse_byte_size(value: &Value) -> Option<u128> {
	match value {
		Value::Integer(i) => u128::try_from(*i).ok(),
		Value::Float(f) => parse_byte_size_float(*f),
		Value::String(s) => parse_byte_size_str(s),
		_ => None,
	}
}

fn parse_byte_size_float(bytes: f64) -> Option<u128> {
	if !bytes.is_finite() || bytes < 0.0 {
		return None;
	}

	// `u128::MAX as f64` is exactly 2^128, the first value out of range
	let rounded = bytes.round();
	(rounded < u128::MAX as f64).then(|| rounded as u128)
}

fn parse_byte_size_str(input: &str) -> Option<u128> {
	let captures = BYTE_SIZE.captures(input)?;
	let whole: u128 = captures.get(1)?.as_str().parse().ok()?;
	let power = unit_power(&captures.get(3).map_or("", |m| m.as_str()).to_ascii_lowercase())?;
	let multiplier = 1024u128.checked_pow(power)?;

	let mut bytes = whole.checked_mul(multiplier)?;

	if let Some(fraction) = captures.get(2) {
		let digits = &fraction.as_str()[..fraction.as_str().len().min(MAX_FRACTION_DIGITS)];
		let numerator: u128 = digits.parse().ok()?;
		let denominator = 10u128.checked_pow(digits.len() as u32)?;
		let scaled = numerator.checked_mul(multiplier)?;
		// Round half up: (2n + d) / 2d
		let rounded = scaled
			.checked_mul(2)?
			.checked_add(denominator)?
			/ denominator.checked_mul(2)?;
		bytes = bytes.checked_add(rounded)?;
	}

	Some(bytes)
}

fn unit_power(unit: &str) -> Option<u32> {
	if matches!(unit, "" | "b" | "byte" | "bytes") {
		return Some(0);
	}

	for (index, (letter, si, iec)) in PREFIXES.iter().enumerate() {
		let short = unit
			.strip_prefix(letter)
			.is_some_and(|rest| matches!(rest, "" | "b" | "i" | "ib"));
		let long = [si, iec].iter().any(|name| {
			unit.strip_prefix(*name)
				.is_some_and(|rest| matches!(rest, "byte" | "bytes"))
		});
		if short || long {
			return Some(index as u32 + 1);
		}
	}

	None
}

/// Parse a duration.
///
/// Integers are milliseconds. Strings use human notation (`"10s"`,
/// `"1h 30m"`, `"5 minutes"`). The sentinel (`-1`, `"infinite"`, `"inf"`)
/// maps to [`INFINITE_DURATION`] when `infinite_allowed`; otherwise it is not
/// a valid duration.
pub fn parse_duration(value: &Value, infinite_allowed: bool) -> Option<Duration> {
	if is_infinite_sentinel(value) {
		return infinite_allowed.then_some(INFINITE_DURATION);
	}

	match value {
		Value::Integer(ms) => u64::try_from(*ms).ok().map(Duration::from_millis),
		Value::Float(ms) if ms.is_finite() && *ms >= 0.0 => {
			Duration::try_from_secs_f64(ms / 1000.0).ok()
		}
		Value::String(s) => parse_duration_str(s),
		_ => None,
	}
}

fn parse_duration_str(input: &str) -> Option<Duration> {
	let input = input.trim();
	if input.is_empty() {
		return None;
	}

	if let Ok(ms) = input.parse::<u64>() {
		return Some(Duration::from_millis(ms));
	}

	let compact = NUMBER_UNIT_GAP.replace_all(input, "$1$2");
	humantime::parse_duration(&compact).ok()
}

fn is_infinite_sentinel(value: &Value) -> bool {
	match value {
		Value::Integer(-1) => true,
		Value::String(s) => {
			let s = s.trim();
			s == "-1" || s.eq_ignore_ascii_case("infinite") || s.eq_ignore_ascii_case("inf")
		}
		_ => false,
	}
}

/// Turn a duration back into a value that parses to the same duration.
pub(crate) fn duration_to_value(duration: Duration) -> Value {
	if duration == INFINITE_DURATION {
		return Value::from("infinite");
	}

	match i64::try_from(duration.as_millis()) {
		Ok(ms) if duration.subsec_nanos() % 1_000_000 == 0 => Value::Integer(ms),
		_ => Value::String(humantime::format_duration(duration).to_string()),
	}
}
