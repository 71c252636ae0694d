//! Opaque reference handles travel as decimal strings so JSON consumers with
//! 53-bit integers never truncate them.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(handle: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&handle.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RefInput {
        Text(String),
        Number(u64),
    }

    match RefInput::deserialize(deserializer)? {
        RefInput::Text(raw) => parse_handle(&raw).map_err(D::Error::custom),
        RefInput::Number(handle) => Ok(handle),
    }
}

fn parse_handle(raw: &str) -> Result<u64, String> {
    let trimmed = raw.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse::<u64>(),
    };
    parsed.map_err(|err| format!("invalid opaque reference {raw:?}: {err}"))
}
