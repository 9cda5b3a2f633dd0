//! Utilities for parsing JSON5 and deserializing it to Rust types.
//!
//! This module provides convenient wrappers around `json5` and `serde_json`
//! to reduce boilerplate when working with configuration files.

use std::collections::BTreeMap;

use anyhow::Context as _;
use serde::{de::DeserializeOwned, Serialize};

/// Parse JSON5 text into a `serde_json::Value`.
///
/// # Errors
///
/// Returns an error if the text is not valid JSON5.
pub fn parse_value(text: &str) -> anyhow::Result<serde_json::Value> {
    json5::from_str(text).context("Failed to parse JSON5")
}

/// Parse JSON5 text and deserialize it into a specific type with a custom
/// context message.
///
/// This is useful when you want to provide a specific error message that
/// includes additional information like the file path.
///
/// # Errors
///
/// Returns an error if:
/// - The text is not valid JSON5
/// - The value cannot be deserialized into type `T`
pub fn from_str_with_context<T: DeserializeOwned>(
    text: &str,
    context: impl Fn() -> String,
) -> anyhow::Result<T> {
    json5::from_str(text).with_context(|| format!("{}: JSON5 parse error", context()))
}

/// Parse JSON5 bytes and deserialize it into a specific type with a custom
/// context message.
///
/// This handles UTF-8 conversion, parsing, and deserialization in one step.
///
/// # Errors
///
/// Returns an error if:
/// - The bytes are not valid UTF-8
/// - The text is not valid JSON5
/// - The value cannot be deserialized into type `T`
pub fn from_slice_with_context<T: DeserializeOwned>(
    slice: &[u8],
    context: impl Fn() -> String,
) -> anyhow::Result<T> {
    let text = std::str::from_utf8(slice)
        .with_context(|| format!("{}: File is not valid UTF-8", context()))?;
    from_str_with_context(text, context)
}

/// A JSON value whose objects always serialize with sorted keys.
#[derive(Serialize)]
#[serde(untagged)]
enum SortedValue {
    Object(BTreeMap<String, SortedValue>),
    Array(Vec<SortedValue>),
    Leaf(serde_json::Value),
}

impl From<serde_json::Value> for SortedValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => SortedValue::Object(
                map.into_iter()
                    .map(|(key, value)| (key, SortedValue::from(value)))
                    .collect(),
            ),
            serde_json::Value::Array(items) => {
                SortedValue::Array(items.into_iter().map(SortedValue::from).collect())
            }
            leaf => SortedValue::Leaf(leaf),
        }
    }
}

/// Serialize a value to pretty-printed JSON with object keys sorted
/// alphabetically, followed by a newline.
///
/// The output is valid JSON5, so it can be read back with the parsing
/// functions in this module.
///
/// # Errors
///
/// Returns an error if the value cannot be represented as JSON.
pub fn to_string_pretty_sorted<T: Serialize>(value: &T) -> anyhow::Result<String> {
    let value = serde_json::to_value(value).context("Failed to serialize to JSON")?;
    let mut output = serde_json::to_string_pretty(&SortedValue::from(value))
        .context("Failed to serialize sorted JSON")?;
    output.push('\n');
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_parse_value_with_comments() {
        let value = parse_value(
            r#"{
            // This is a comment
            "foo": "bar" // Inline comment
        }"#,
        )
        .unwrap();
        assert_eq!(value["foo"], "bar");
    }

    #[test]
    fn test_parse_value_with_trailing_comma() {
        let value = parse_value(
            r#"{
            "foo": "bar",
            "baz": 123,
        }"#,
        )
        .unwrap();
        assert_eq!(value["foo"], "bar");
        assert_eq!(value["baz"], 123);
    }

    #[test]
    fn test_parse_value_invalid() {
        assert!(parse_value("").is_err());
        assert!(parse_value("{invalid").is_err());
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestStruct {
        foo: String,
        bar: i32,
    }

    #[test]
    fn test_from_str_with_context() {
        let result: TestStruct =
            from_str_with_context(r#"{ foo: "hello", bar: 42 }"#, || "test.json5".to_string())
                .unwrap();
        assert_eq!(
            result,
            TestStruct {
                foo: "hello".to_string(),
                bar: 42
            }
        );

        let err = from_str_with_context::<TestStruct>(r#"{ foo: 1 }"#, || {
            "test.json5".to_string()
        })
        .unwrap_err();
        assert!(err.to_string().contains("test.json5"));
    }

    #[test]
    fn test_from_slice_with_context_invalid_utf8() {
        let err = from_slice_with_context::<TestStruct>(&[0xff, 0xfe], || "bad.json5".to_string())
            .unwrap_err();
        assert!(err.to_string().contains("bad.json5"));
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_to_string_pretty_sorted() {
        let value = serde_json::json!({
            "zeta": 1,
            "alpha": { "b": true, "a": [3, 2, 1] },
        });

        let output = to_string_pretty_sorted(&value).unwrap();
        insta::assert_snapshot!(output, @r#"
        {
          "alpha": {
            "a": [
              3,
              2,
              1
            ],
            "b": true
          },
          "zeta": 1
        }
        "#);

        let round_trip: serde_json::Value = parse_value(&output).unwrap();
        assert_eq!(round_trip, value);
    }
}
