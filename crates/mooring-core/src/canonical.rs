//! # Canonical Serialization
//!
//! `CanonicalBytes` is the only input accepted by [`crate::sha256_digest`].
//! Records are converted to a JSON value, checked for floats, and written in
//! RFC 8785 (JCS) form: sorted keys, compact separators, UTF-8.
//!
//! ## Invariant
//!
//! The inner `Vec<u8>` is private. Any two processes that canonicalize the
//! same record produce the same bytes, and therefore the same
//! [`crate::ContentRef`].

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization of a float-free value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    ///
    /// # Errors
    ///
    /// `FloatRejected` if the value contains a non-integer number,
    /// `SerializationFailed` if the value cannot be represented as JSON.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        reject_floats(&value)?;
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Walk the value tree and fail on the first float.
///
/// Nonces, block numbers and epoch values are all integers; a float in a
/// record means the producer built it wrong.
fn reject_floats(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => {
            if !n.is_i64() && !n.is_u64() {
                if let Some(f) = n.as_f64() {
                    return Err(CanonicalizationError::FloatRejected(f));
                }
            }
            Ok(())
        }
        Value::Array(items) => items.iter().try_for_each(reject_floats),
        Value::Object(map) => map.values().try_for_each(reject_floats),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn json_value_no_floats() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| serde_json::json!(n)),
            "[a-zA-Z0-9_ ]{0,32}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 48, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn canonicalization_is_deterministic(value in json_value_no_floats()) {
            let a = CanonicalBytes::new(&value).unwrap();
            let b = CanonicalBytes::new(&value).unwrap();
            prop_assert_eq!(a.as_bytes(), b.as_bytes());
        }

        #[test]
        fn canonical_output_parses_back(value in json_value_no_floats()) {
            let cb = CanonicalBytes::new(&value).unwrap();
            let parsed: Value = serde_json::from_slice(cb.as_bytes()).unwrap();
            prop_assert_eq!(parsed, value);
        }
    }
}
