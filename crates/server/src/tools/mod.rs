//! MCP tool implementations.
//!
//! This module contains all tools exposed by the markcache server.

pub mod favicon;
pub mod screenshot;

use rmcp::{ErrorData as McpError, model::*};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(output)
        .map_err(|e| McpError::internal_error(format!("failed to serialize tool output: {e}"), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

/// Order batch results by input and list the inputs that produced nothing.
pub(crate) fn split_batch<T>(inputs: &[String], mut resolved: HashMap<String, T>) -> (BTreeMap<String, T>, Vec<String>) {
    let mut results = BTreeMap::new();
    let mut failed = Vec::new();
    for input in inputs {
        match resolved.remove(input) {
            Some(value) => {
                results.insert(input.clone(), value);
            }
            None if !results.contains_key(input) && !failed.contains(input) => failed.push(input.clone()),
            None => {}
        }
    }
    (results, failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_batch() {
        let inputs = vec!["b".to_string(), "a".to_string(), "c".to_string(), "a".to_string()];
        let resolved = HashMap::from([("a".to_string(), 1), ("b".to_string(), 2)]);

        let (results, failed) = split_batch(&inputs, resolved);
        assert_eq!(results.into_iter().collect::<Vec<_>>(), vec![("a".to_string(), 1), ("b".to_string(), 2)]);
        assert_eq!(failed, vec!["c".to_string()]);
    }

    #[test]
    fn test_json_result() {
        let result = json_result(&serde_json::json!({"ok": true})).unwrap();
        let text = result.content.first().and_then(|c| c.as_text()).map(|t| t.text.clone()).unwrap();
        assert!(text.contains("\"ok\": true"));
    }
}
