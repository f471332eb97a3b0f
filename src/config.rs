pub mod validation;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;

use crate::error::PKResult;

pub use validation::{validate, ValidatedConfig};

pub const MAX_TIME_HORIZON: f64 = 5.0;

pub const DEFAULT_V_C: f64 = 1.0;
pub const DEFAULT_CL: f64 = 1.0;
pub const DEFAULT_X: f64 = 1.0;
pub const DEFAULT_DOSE_MODE: &str = "normal";
pub const DEFAULT_NR_COMPARTMENTS: u64 = 1;
/// Largest accepted `nr_compartments`. Defaulting synthesizes no
/// peripherals above it and the validator reports OutOfRange.
pub const MAX_COMPARTMENTS: u64 = 1000;
pub const DEFAULT_TIME: f64 = 1.0;
pub const DEFAULT_PERIPHERAL: (f64, f64) = (1.0, 1.0);
pub const DEFAULT_K_A: f64 = 1.0;
pub const DEFAULT_X_LOW: f64 = 0.0;
pub const DEFAULT_PULSE_WIDTH: f64 = 0.1;
pub const DEFAULT_PULSE_INTERVAL: f64 = 0.1;

/// Key of the `index`-th peripheral compartment (1-based).
pub fn periph_key(index: usize) -> String {
    format!("periph_{}", index)
}

/// Raw configuration mapping as delivered by the caller.
///
/// The mapping is kept loosely typed so the validator can classify bad
/// input instead of failing at decode time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(Value);

impl Configuration {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> PKResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        Ok(Self(value))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.as_object().and_then(|map| map.get(key))
    }

    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }
}

impl From<Value> for Configuration {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Fill absent optional keys; keys already present are never touched.
///
/// Input that is not a mapping is passed through unchanged so that
/// validation can report it as an invalid shape.
pub fn with_defaults(input: Value) -> Configuration {
    let mut map = match input {
        Value::Object(map) => map,
        other => return Configuration(other),
    };

    insert_absent(&mut map, "V_c", json!(DEFAULT_V_C));
    insert_absent(&mut map, "CL", json!(DEFAULT_CL));
    insert_absent(&mut map, "X", json!(DEFAULT_X));
    insert_absent(&mut map, "dose_mode", json!(DEFAULT_DOSE_MODE));
    insert_absent(&mut map, "nr_compartments", json!(DEFAULT_NR_COMPARTMENTS));
    insert_absent(&mut map, "time", json!(DEFAULT_TIME));
    insert_absent(
        &mut map,
        "periph_default",
        json!([DEFAULT_PERIPHERAL.0, DEFAULT_PERIPHERAL.1]),
    );

    // A malformed or oversized count is left for the validator.
    if let Some(count) = map
        .get("nr_compartments")
        .and_then(Value::as_u64)
        .filter(|&count| count <= MAX_COMPARTMENTS)
    {
        let fallback = map["periph_default"].clone();
        for i in 1..=count as usize {
            let key = periph_key(i);
            if !map.contains_key(&key) {
                debug!("Filling {} from periph_default", key);
                map.insert(key, fallback.clone());
            }
        }
    }

    if map.get("injection_type").and_then(Value::as_str) == Some("subcutaneous") {
        insert_absent(&mut map, "k_a", json!(DEFAULT_K_A));
    }

    if map.get("dose_mode").and_then(Value::as_str) == Some("pulse") {
        insert_absent(&mut map, "X_low", json!(DEFAULT_X_LOW));
        insert_absent(&mut map, "pulse_width", json!(DEFAULT_PULSE_WIDTH));
        insert_absent(&mut map, "pulse_interval", json!(DEFAULT_PULSE_INTERVAL));
    }

    Configuration(Value::Object(map))
}

fn insert_absent(map: &mut Map<String, Value>, key: &str, value: Value) {
    if !map.contains_key(key) {
        debug!("Defaulting {} to {}", key, value);
        map.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_parameters() {
        let input = json!({
            "name": "model_test_2",
            "injection_type": "intravenous",
            "V_c": 2.0,
        });

        let config = with_defaults(input);
        let expected = json!({
            "name": "model_test_2",
            "injection_type": "intravenous",
            "V_c": 2.0,
            "periph_default": [1.0, 1.0],
            "periph_1": [1.0, 1.0],
            "CL": 1.0,
            "X": 1.0,
            "dose_mode": "normal",
            "nr_compartments": 1,
            "time": 1.0,
        });
        assert_eq!(config.as_value(), &expected);
    }

    #[test]
    fn test_defaults_never_overwrite() {
        let input = json!({
            "name": "keep",
            "injection_type": "subcutaneous",
            "CL": "not a number",
            "k_a": 4.5,
            "nr_compartments": 2,
            "periph_2": [7.0, 8.0],
        });

        let config = with_defaults(input);
        assert_eq!(config.get("CL"), Some(&json!("not a number")));
        assert_eq!(config.get("k_a"), Some(&json!(4.5)));
        assert_eq!(config.get("periph_1"), Some(&json!([1.0, 1.0])));
        assert_eq!(config.get("periph_2"), Some(&json!([7.0, 8.0])));
    }

    #[test]
    fn test_periph_default_is_used_for_missing_compartments() {
        let input = json!({
            "name": "custom",
            "injection_type": "intravenous",
            "nr_compartments": 3,
            "periph_default": [2.0, 0.5],
            "periph_2": [9.0, 9.0],
        });

        let config = with_defaults(input);
        assert_eq!(config.get("periph_1"), Some(&json!([2.0, 0.5])));
        assert_eq!(config.get("periph_2"), Some(&json!([9.0, 9.0])));
        assert_eq!(config.get("periph_3"), Some(&json!([2.0, 0.5])));
        assert_eq!(config.get("periph_4"), None);
    }

    #[test]
    fn test_oversized_count_synthesizes_nothing() {
        let config = with_defaults(json!({
            "name": "huge",
            "injection_type": "intravenous",
            "nr_compartments": 1_000_000_000_000u64,
        }));
        let map = config.as_value().as_object().unwrap();
        assert!(!map.keys().any(|k| k.starts_with("periph_") && k != "periph_default"));

        let config = with_defaults(json!({
            "name": "largest",
            "injection_type": "intravenous",
            "nr_compartments": MAX_COMPARTMENTS,
        }));
        assert!(config.get(&periph_key(MAX_COMPARTMENTS as usize)).is_some());
    }

    #[test]
    fn test_absorption_rate_only_for_subcutaneous() {
        let iv = with_defaults(json!({"name": "a", "injection_type": "intravenous"}));
        assert_eq!(iv.get("k_a"), None);

        let sc = with_defaults(json!({"name": "b", "injection_type": "subcutaneous"}));
        assert_eq!(sc.get("k_a"), Some(&json!(DEFAULT_K_A)));
    }

    #[test]
    fn test_pulse_settings_defaulted() {
        let config = with_defaults(json!({
            "name": "p",
            "injection_type": "intravenous",
            "dose_mode": "pulse",
            "pulse_width": 0.5,
        }));
        assert_eq!(config.get("pulse_width"), Some(&json!(0.5)));
        assert_eq!(config.get("pulse_interval"), Some(&json!(DEFAULT_PULSE_INTERVAL)));
        assert_eq!(config.get("X_low"), Some(&json!(DEFAULT_X_LOW)));
    }

    #[test]
    fn test_non_mapping_passes_through() {
        let config = with_defaults(json!("string"));
        assert_eq!(config.as_value(), &json!("string"));
    }
}
