//! JSON-Cadence argument encoding and decoding.
//!
//! Transactions are sent with `--args-json`, so every argument is an
//! object like `{"type": "UInt64", "value": "42"}`. Integers travel as
//! strings.

use core_logic::ConfigError;
use serde_json::{Value, json};

pub fn uint8(value: u8) -> Value {
    json!({"type": "UInt8", "value": value.to_string()})
}

pub fn uint32(value: u32) -> Value {
    json!({"type": "UInt32", "value": value.to_string()})
}

pub fn uint64(value: u64) -> Value {
    json!({"type": "UInt64", "value": value.to_string()})
}

/// `address` must already be normalized, see [`normalize_address`]
pub fn address(address: &str) -> Value {
    json!({"type": "Address", "value": address})
}

pub fn array(values: Vec<Value>) -> Value {
    json!({"type": "Array", "value": values})
}

/// Lower-case, `0x`-prefixed, 16 hex digits
pub fn normalize_address(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex.is_empty() || hex.len() > 16 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::invalid(
            "address",
            format!("'{}' is not a Flow address", raw),
        ));
    }

    Ok(format!("0x{:0>16}", hex.to_lowercase()))
}

/// Reads `[UInt64]` script output into plain integers
pub fn decode_u64_array(value: &Value) -> Result<Vec<u64>, String> {
    let items = match value.get("value") {
        Some(Value::Array(items)) => items,
        _ => return Err(format!("expected a Cadence array, got {}", value)),
    };

    items
        .iter()
        .map(|item| {
            let inner = item.get("value").unwrap_or(item);
            match inner {
                Value::String(s) => s
                    .parse::<u64>()
                    .map_err(|e| format!("bad UInt64 '{}': {}", s, e)),
                Value::Number(n) => n
                    .as_u64()
                    .ok_or_else(|| format!("bad UInt64 {}", n)),
                other => Err(format!("bad UInt64 {}", other)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_scalars() {
        assert_eq!(uint64(12345), json!({"type": "UInt64", "value": "12345"}));
        assert_eq!(uint32(7), json!({"type": "UInt32", "value": "7"}));
        assert_eq!(uint8(4), json!({"type": "UInt8", "value": "4"}));
    }

    #[test]
    fn test_encode_array() {
        let arr = array(vec![uint64(1), uint64(2)]);
        assert_eq!(arr["type"], "Array");
        assert_eq!(arr["value"][1]["value"], "2");
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(
            normalize_address("0x4AB8B294112F182C").unwrap(),
            "0x4ab8b294112f182c"
        );
        assert_eq!(normalize_address("f8d6e0586b0a20c7").unwrap(), "0xf8d6e0586b0a20c7");
        assert_eq!(normalize_address("0x01").unwrap(), "0x0000000000000001");
        assert!(normalize_address("0x").is_err());
        assert!(normalize_address("mainnet-account4").is_err());
        assert!(normalize_address("0x4ab8b294112f182c00").is_err());
    }

    #[test]
    fn test_decode_script_output() {
        let out = json!({
            "type": "Array",
            "value": [
                {"type": "UInt64", "value": "12345"},
                {"type": "UInt64", "value": "67890"}
            ]
        });
        assert_eq!(decode_u64_array(&out).unwrap(), vec![12345, 67890]);

        let empty = json!({"type": "Array", "value": []});
        assert!(decode_u64_array(&empty).unwrap().is_empty());

        assert!(decode_u64_array(&json!({"type": "UInt64", "value": "1"})).is_err());
        assert!(decode_u64_array(&json!({"value": [{"value": "x"}]})).is_err());
    }
}
