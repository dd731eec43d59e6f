//! Shape checks applied before anything touches the transport.

use serde_json::Value;

/// True iff `value` is `0x` followed by exactly 40 hex digits, in any case.
///
/// Checksums are not verified.
pub fn is_address(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// True iff `value` is a JSON array. Entries are not inspected.
pub const fn is_descriptor(value: &Value) -> bool {
    matches!(value, Value::Array(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_address() {
        assert!(is_address("0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"));
        assert!(is_address("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"));
        assert!(is_address("0x0000000000000000000000000000000000000000"));

        assert!(!is_address("not-hex"));
        assert!(!is_address(""));
        assert!(!is_address("0x"));
        assert!(!is_address("7e5f4552091a69125d5dfcb7b8c2659029395bdf"));
        assert!(!is_address("0X7e5f4552091a69125d5dfcb7b8c2659029395bdf"));
        assert!(!is_address("0x7e5f4552091a69125d5dfcb7b8c2659029395bd"));
        assert!(!is_address("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf0"));
        assert!(!is_address("0x7e5f4552091a69125d5dfcb7b8c2659029395bdg"));
    }

    #[test]
    fn test_is_descriptor() {
        assert!(is_descriptor(&json!([])));
        assert!(is_descriptor(&json!([{ "type": "function" }])));
        // Entries are not validated
        assert!(is_descriptor(&json!([1, "two"])));

        assert!(!is_descriptor(&json!({ "abi": [] })));
        assert!(!is_descriptor(&json!("[]")));
        assert!(!is_descriptor(&Value::Null));
    }
}
