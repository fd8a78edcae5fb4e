// Utility helpers for lenient number handling, formatting and ordering.
//
// Telemetry arrives as loosely typed JSON: counters may be numbers, numeric
// strings, `null`, or missing entirely. Everything numeric is normalised to a
// finite `f64` here so the aggregation code never sees a NaN.
use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues (whitespace, thousands separators).
///
/// Returns `None` for anything that cannot be safely parsed or is not finite.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Coerce an arbitrary JSON value to a number, defaulting to 0.
pub fn numeric_value(v: Option<&Value>) -> f64 {
    match v {
        Some(Value::Number(n)) => n.as_f64().filter(|x| x.is_finite()).unwrap_or(0.0),
        Some(Value::String(s)) => parse_f64_safe(Some(s)).unwrap_or(0.0),
        // Booleans, arrays and objects are not counters.
        _ => 0.0,
    }
}

/// serde adapter: any JSON value becomes a finite `f64` (0 when absent or
/// non-numeric). Pair with `#[serde(default)]` for missing keys.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(numeric_value(v.as_ref()))
}

/// serde adapter for counter maps such as the alarm breakdown.
pub fn lenient_counter_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    let mut out = BTreeMap::new();
    if let Some(Value::Object(map)) = v {
        for (k, v) in map {
            out.insert(k, numeric_value(Some(&v)));
        }
    }
    Ok(out)
}

/// serde adapter for optional counters: `None` only when the key is missing
/// or `null`, otherwise the lenient numeric value.
pub fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(match v {
        None | Some(Value::Null) => None,
        Some(other) => Some(numeric_value(Some(&other))),
    })
}

/// serde adapter for string dimensions that sometimes arrive as numbers.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(match v {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Fixed-decimal rendering without thousands separators, so the result can be
/// parsed back by [`parse_f64_safe`].
pub fn format_fixed(n: f64, decimals: usize) -> String {
    let s = format!("{:.*}", decimals, n);
    // `-0.00` reads badly in a report cell.
    if s.starts_with('-') && s[1..].chars().all(|c| c == '0' || c == '.') {
        s[1..].to_string()
    } else {
        s
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for counts in console messages
    // (e.g., `9,855 records loaded`).
    n.to_formatted_string(&Locale::en)
}

/// Numeric-aware string ordering: `"M2"` sorts before `"M10"`.
///
/// Runs of ASCII digits compare by value (ties broken by length, so `"01"`
/// follows `"1"`); everything else compares character by character.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let da = take_digits(&mut ai);
                let db = take_digits(&mut bi);
                let ta = da.trim_start_matches('0');
                let tb = db.trim_start_matches('0');
                let ord = ta
                    .len()
                    .cmp(&tb.len())
                    .then_with(|| ta.cmp(tb))
                    .then_with(|| da.len().cmp(&db.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                if ca != cb {
                    return ca.cmp(&cb);
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits<I: Iterator<Item = char>>(it: &mut std::iter::Peekable<I>) -> String {
    let mut s = String::new();
    while let Some(c) = it.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        s.push(c);
        it.next();
    }
    s
}
