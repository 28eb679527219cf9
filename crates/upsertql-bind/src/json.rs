//! JSON encoding for JSON-shaped field values.

use std::fmt;

use upsertql_core::Result;

/// Renders a JSON value to the text bound for JSON columns.
pub trait JsonCodec: Send + Sync + fmt::Debug {
    fn encode(&self, value: &serde_json::Value) -> Result<String>;
}

/// [`JsonCodec`] backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJsonCodec;

impl JsonCodec for SerdeJsonCodec {
    fn encode(&self, value: &serde_json::Value) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }
}
