use anyhow::Result;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::global::Options;

pub fn json_schema() -> Result<String> {
    let schema = schema_for!(Conf);
    Ok(serde_json::to_string_pretty(&schema)?)
}

/// One configured receiver: a registry kind plus the opaque value its
/// factory validates.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReceiverConf {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct Conf {
    #[serde(default)]
    pub version: String,
    pub receivers: Vec<ReceiverConf>,
    #[serde(default)]
    pub options: Options,
}
