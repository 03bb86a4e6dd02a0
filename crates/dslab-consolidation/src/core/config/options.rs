//! Parsing of strategy descriptions used in config files.

use std::collections::HashMap;
use std::str::FromStr;

/// Splits a strategy description into the strategy name and its options string.
///
/// `StaticThreshold[threshold=0.8]` is split into `StaticThreshold` and `threshold=0.8`.
pub fn parse_config_value(config_str: &str) -> (String, Option<String>) {
    match config_str.trim().split_once('[') {
        Some((l, r)) => (l.trim().to_string(), Some(r.replace(']', ""))),
        None => (config_str.trim().to_string(), None),
    }
}

/// Parses comma-separated `name=value` pairs into a map.
///
/// ```ignore
/// let options = parse_options("safety=2.5,fallback=0.8");
/// assert_eq!(options.get("safety").unwrap(), "2.5");
/// assert_eq!(options.get("other"), None);
/// ```
pub fn parse_options(options_str: &str) -> HashMap<String, String> {
    let mut options = HashMap::new();
    for option_str in options_str.split(',') {
        if let Some((name, value)) = option_str.split_once('=') {
            options.insert(name.trim().to_string(), value.trim().to_string());
        }
    }
    options
}

/// Returns the parsed value of the named option or `default` if it is absent.
///
/// Panics if the option is present but can't be parsed.
pub fn option_or<T: FromStr>(options: &HashMap<String, String>, name: &str, default: T) -> T {
    match options.get(name) {
        Some(value) => value
            .parse::<T>()
            .unwrap_or_else(|_| panic!("Can't parse option {}={}", name, value)),
        None => default,
    }
}

/// Parses options string of a strategy description, treating a missing string as empty.
pub fn parse_optional_options(options_str: &Option<String>) -> HashMap<String, String> {
    options_str.as_deref().map(parse_options).unwrap_or_default()
}
