use serde::{Deserialize, Serialize};

/// Tunables for an [`EvalContext`](crate::EvalContext).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Deepest function-call frame allowed before a call fails.
    pub max_call_depth: usize,
    /// Log every computed or cached value at trace level.
    pub trace_values: bool,
    /// Purge caches of nodes that no longer exist during prepare.
    pub collect_garbage: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
            trace_values: true,
            collect_garbage: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EvalConfig = serde_json::from_str(r#"{"max_call_depth": 8}"#).unwrap();
        assert_eq!(config.max_call_depth, 8);
        assert!(config.trace_values);
        assert!(config.collect_garbage);
    }
}
