use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::value::Value;

/// Named parameter values of one node.
///
/// The evaluator hands executors a frozen copy of this map, so edits made
/// while a graph is being evaluated never leak into a running computation.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct ParameterMap {
    values: BTreeMap<String, Value>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: String, value: Value) {
        self.values.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.get_as::<String>())
    }

    /// Fill in every key of `defaults` that is not already set.
    pub fn merge_defaults(&mut self, defaults: &ParameterMap) {
        for (key, value) in defaults.iter() {
            self.values
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

impl FromIterator<(String, Value)> for ParameterMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_defaults_keeps_explicit_values() {
        let defaults = ParameterMap::new().with("value", 0).with("op", "==");
        let mut params = ParameterMap::new().with("value", 5);
        params.merge_defaults(&defaults);

        assert_eq!(params.get_i64("value"), Some(5));
        assert_eq!(params.get_string("op").as_deref(), Some("=="));
    }

    #[test]
    fn test_transparent_serialization() {
        let params = ParameterMap::new().with("scale", 2.5);
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"scale":2.5}"#);
    }
}
