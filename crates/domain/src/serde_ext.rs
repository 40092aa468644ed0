//! Serde helpers for lenient server payloads.
//!
//! The gateway encodes empty Go maps and slices as `null`, so fields that
//! default to an empty collection must accept `null` as well as absence.

use serde::{Deserialize, Deserializer};

/// Deserialize a field, mapping an explicit `null` to `T::default()`.
///
/// Pair with `#[serde(default)]` so a missing key is handled too.
pub fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Payload {
        #[serde(default, deserialize_with = "null_default")]
        levels: BTreeMap<String, u32>,
    }

    #[test]
    fn test_null_and_missing_become_default() {
        let from_null: Payload = serde_json::from_str(r#"{"levels": null}"#).unwrap();
        let from_missing: Payload = serde_json::from_str("{}").unwrap();
        assert!(from_null.levels.is_empty());
        assert!(from_missing.levels.is_empty());
    }

    #[test]
    fn test_present_value_is_kept() {
        let payload: Payload = serde_json::from_str(r#"{"levels": {"mining": 3}}"#).unwrap();
        assert_eq!(payload.levels.get("mining"), Some(&3));
    }
}
