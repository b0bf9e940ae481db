//! Base64-wrapped JSON documents returned by the refresh queries.
//!
//! The device is loose with JSON types: ids arrive as numbers or numeric
//! strings, and `LINK` as a bool or a string.

use data_encoding::BASE64;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::MixBoardError;
use crate::query::parse_id;

/// Response to `MBC_GETVIDEOINPUTLIST`
#[derive(Debug, Deserialize)]
pub struct InputList {
    #[serde(rename = "MAXSUPPORTEDINPUTS", deserialize_with = "lenient_u32")]
    pub max_supported_inputs: u32,
    #[serde(rename = "VIDEOINPUTLIST", default)]
    pub inputs: Vec<InputEntry>,
}

#[derive(Debug, Deserialize)]
pub struct InputEntry {
    #[serde(rename = "NAME", deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(rename = "VIDEOINPUTID", deserialize_with = "lenient_u32")]
    pub id: u32,
}

/// Response to `MBC_GETMIXBOARDINFO`
#[derive(Debug, Deserialize)]
pub struct MixState {
    #[serde(rename = "PREVIEW", deserialize_with = "lenient_u32")]
    pub preview: u32,
    #[serde(rename = "PROGRAM", deserialize_with = "lenient_u32")]
    pub program: u32,
    #[serde(rename = "KEYER", default)]
    pub keyers: Vec<KeyerEntry>,
}

#[derive(Debug, Deserialize)]
pub struct KeyerEntry {
    #[serde(rename = "KEYERID", deserialize_with = "lenient_u32")]
    pub id: u32,
    #[serde(rename = "STATUS", default)]
    pub status: String,
    #[serde(rename = "LINK", default, deserialize_with = "lenient_bool")]
    pub link: bool,
}

/// Decode a base64 response line and parse the JSON inside it.
pub fn decode<T: DeserializeOwned>(line: &str) -> Result<T, MixBoardError> {
    let json = BASE64.decode(line.trim().as_bytes())?;
    Ok(serde_json::from_slice(&json)?)
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| D::Error::custom(format!("id out of range: {n}"))),
        Value::String(s) => {
            parse_id(&s).ok_or_else(|| D::Error::custom(format!("not an id: {s:?}")))
        }
        other => Err(D::Error::custom(format!("expected an id, got {other}"))),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}

#[cfg(test)]
pub(crate) fn encode(json: &str) -> String {
    BASE64.encode(json.as_bytes())
}
