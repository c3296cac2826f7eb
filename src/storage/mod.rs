//! Persistence layout shared with the ui.
//!  - Every domain visited has its own key holding whole seconds spent on it.
//!  - [BLOCK_LIST_KEY] holds the ordered list of domains blocked for the session.
//!
//! [json_store::JsonFileStore] keeps the layout in a single json object on disk.

pub mod json_store;

use serde_json::{Map, Value};

pub const BLOCK_LIST_KEY: &str = "sessionBlockedDomains";

/// Interprets a stored counter. Anything that isn't a non-negative integer counts as zero.
pub fn counter_value(value: Option<&Value>) -> u64 {
    value.and_then(Value::as_u64).unwrap_or(0)
}

/// Extracts counters from the whole store, leaving out reserved keys.
pub fn domain_counters(items: &Map<String, Value>) -> Vec<(String, u64)> {
    items
        .iter()
        .filter(|(key, _)| key.as_str() != BLOCK_LIST_KEY)
        .map(|(key, value)| (key.clone(), counter_value(Some(value))))
        .collect()
}

/// Interprets a stored block list. A missing or malformed list is empty.
pub fn block_list_value(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|domains| {
            domains
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}
