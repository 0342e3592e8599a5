use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;

use runviz::GraphRecord;

/// Accepts either a single run record or an array of them, oldest first.
pub(super) fn parse_history(raw: &str) -> Result<Vec<GraphRecord>> {
    let parsed: Value = serde_json::from_str(raw).context("history is not valid JSON")?;

    let entries = match parsed {
        Value::Array(entries) => entries,
        record @ Value::Object(_) => vec![record],
        other => {
            return Err(anyhow!(
                "expected a run record or an array of run records, found {}",
                json_kind(&other)
            ));
        }
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            GraphRecord::deserialize(entry)
                .with_context(|| format!("invalid run record at index {index}"))
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
