//! Plain state documents and output extraction

use serde_json::{Map, Value};

use crate::error::{StateError, StateResult};

/// A decrypted (or never encrypted) state document
///
/// Only the `outputs` map is interpreted; everything else in the state is
/// ignored.
#[derive(Debug, Clone)]
pub struct StateDocument {
    outputs: Option<Map<String, Value>>,
}

impl StateDocument {
    /// Take ownership of a state value
    ///
    /// A missing or non-object `outputs` is kept as "no outputs" and reported
    /// when an output is requested.
    pub fn from_value(value: Value) -> Self {
        let outputs = match value {
            Value::Object(mut root) => match root.remove("outputs") {
                Some(Value::Object(outputs)) => Some(outputs),
                _ => None,
            },
            _ => None,
        };
        Self { outputs }
    }

    /// Names of all outputs in the state
    pub fn output_names(&self) -> Vec<&str> {
        self.outputs
            .iter()
            .flat_map(|outputs| outputs.keys().map(String::as_str))
            .collect()
    }

    /// Consume the document and return the `value` of the named output
    ///
    /// The value is passed through untouched, composite values included.
    pub fn into_output(mut self, name: &str) -> StateResult<Value> {
        let outputs = self
            .outputs
            .as_mut()
            .ok_or_else(|| StateError::not_found("no outputs found"))?;

        let Some(entry) = outputs.remove(name) else {
            log::debug!("available outputs: {}", self.output_names().join(", "));
            return Err(StateError::not_found(format!("output '{}' not found", name)));
        };

        let Value::Object(mut entry) = entry else {
            return Err(StateError::format(format!("output '{}' has no value", name)));
        };

        if entry.get("sensitive").and_then(Value::as_bool) == Some(true) {
            log::debug!("reading sensitive output '{}'", name);
        }

        entry
            .remove("value")
            .ok_or_else(|| StateError::format(format!("output '{}' has no value", name)))
    }
}
