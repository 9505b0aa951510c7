// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DER encoding of entitlements plists.
//!
//! Modern Apple operating systems require a DER-encoded representation of
//! the entitlements property list alongside the legacy XML plist form. There
//! is no public specification of the exact dialect used; this module
//! reproduces the tag/length rules observed in the wild (and implemented by
//! other open source re-implementations of code signing).

use crate::error::CodeSignError;

const TAG_BOOLEAN: u8 = 0x01;
const TAG_INTEGER: u8 = 0x02;
const TAG_UTF8_STRING: u8 = 0x0c;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_SET: u8 = 0x31;

/// Append a DER definite-length encoding of `length` to `out`.
fn write_length(out: &mut Vec<u8>, length: usize) {
    if length < 128 {
        out.push(length as u8);
    } else {
        let bytes = length.to_be_bytes();
        let significant = bytes.iter().skip_while(|b| **b == 0).count().max(1);
        out.push(0x80 | significant as u8);
        out.extend_from_slice(&bytes[bytes.len() - significant..]);
    }
}

/// Append the minimal big-endian encoding of `value` (at least one byte).
fn write_minimal_be(out: &mut Vec<u8>, value: u64) {
    let bytes = value.to_be_bytes();
    let significant = bytes.iter().skip_while(|b| **b == 0).count().max(1);
    out.extend_from_slice(&bytes[bytes.len() - significant..]);
}

/// Encode a single [plist::Value] node, including its tag and length.
fn encode_value(value: &plist::Value, out: &mut Vec<u8>) -> Result<(), CodeSignError> {
    match value {
        plist::Value::Boolean(b) => {
            out.push(TAG_BOOLEAN);
            write_length(out, 1);
            out.push(if *b { 1 } else { 0 });
        }
        plist::Value::Integer(i) => {
            // The source reinterprets the integer as an unsigned 64-bit value
            // before encoding, so a negative plist integer round-trips as its
            // two's-complement bit pattern rather than failing to encode.
            let v = i.as_signed().map(|v| v as u64).unwrap_or_else(|| {
                i.as_unsigned().unwrap_or(0)
            });

            let mut payload = Vec::new();
            write_minimal_be(&mut payload, v);

            out.push(TAG_INTEGER);
            write_length(out, payload.len());
            out.extend_from_slice(&payload);
        }
        plist::Value::String(s) => {
            out.push(TAG_UTF8_STRING);
            write_length(out, s.len());
            out.extend_from_slice(s.as_bytes());
        }
        plist::Value::Array(items) => {
            let mut payload = Vec::new();
            for item in items {
                encode_value(item, &mut payload)?;
            }

            out.push(TAG_SEQUENCE);
            write_length(out, payload.len());
            out.extend_from_slice(&payload);
        }
        plist::Value::Dictionary(dict) => {
            let mut payload = Vec::new();

            for (key, value) in dict.iter() {
                let mut entry = Vec::new();
                entry.push(TAG_UTF8_STRING);
                write_length(&mut entry, key.len());
                entry.extend_from_slice(key.as_bytes());
                encode_value(value, &mut entry)?;

                payload.push(TAG_SEQUENCE);
                write_length(&mut payload, entry.len());
                payload.extend_from_slice(&entry);
            }

            out.push(TAG_SET);
            write_length(out, payload.len());
            out.extend_from_slice(&payload);
        }
        plist::Value::Real(_) => {
            return Err(CodeSignError::UnsupportedDERType("floating point"));
        }
        plist::Value::Date(_) => {
            return Err(CodeSignError::UnsupportedDERType("date"));
        }
        plist::Value::Data(_) => {
            return Err(CodeSignError::UnsupportedDERType("opaque data"));
        }
        _ => {
            return Err(CodeSignError::UnsupportedDERType("unknown plist node"));
        }
    }

    Ok(())
}

/// Encode an entitlements plist value tree to Apple's entitlements DER dialect.
pub fn encode_entitlements_plist(value: &plist::Value) -> Result<Vec<u8>, CodeSignError> {
    let mut out = Vec::new();
    encode_value(value, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(pairs: impl IntoIterator<Item = (&'static str, plist::Value)>) -> plist::Value {
        let mut d = plist::Dictionary::new();
        for (k, v) in pairs {
            d.insert(k.to_string(), v);
        }
        plist::Value::Dictionary(d)
    }

    #[test]
    fn length_under_128_is_single_byte() {
        let mut out = Vec::new();
        write_length(&mut out, 127);
        assert_eq!(out, vec![127]);
    }

    #[test]
    fn length_at_or_above_128_uses_long_form() {
        let mut out = Vec::new();
        write_length(&mut out, 128);
        assert_eq!(out, vec![0x81, 128]);

        let mut out = Vec::new();
        write_length(&mut out, 300);
        assert_eq!(out, vec![0x82, 0x01, 0x2c]);
    }

    #[test]
    fn get_task_allow_scenario() {
        // spec.md section 8, concrete scenario 3.
        let v = dict([("get-task-allow", plist::Value::Boolean(true))]);
        let der = encode_entitlements_plist(&v).unwrap();

        // 0x31 <len> 0x30 <len> 0x0C 0x0F "get-task-allow" 0x01 0x01 0x01
        assert_eq!(der[0], 0x31);
        assert_eq!(der[2], 0x30);
        assert_eq!(der[4], 0x0c);
        assert_eq!(der[5], 0x0f);
        assert_eq!(&der[6..20], b"get-task-allow");
        assert_eq!(&der[20..23], &[0x01, 0x01, 0x01]);
    }

    #[test]
    fn empty_dict_encodes_as_empty_set() {
        let v = plist::Value::Dictionary(plist::Dictionary::new());
        let der = encode_entitlements_plist(&v).unwrap();
        assert_eq!(der, vec![0x31, 0x00]);
    }

    #[test]
    fn bool_and_integer_and_string_and_array() {
        assert_eq!(
            encode_entitlements_plist(&plist::Value::Boolean(false)).unwrap(),
            vec![0x01, 0x01, 0x00]
        );
        assert_eq!(
            encode_entitlements_plist(&plist::Value::Integer(42u32.into())).unwrap(),
            vec![0x02, 0x01, 42]
        );
        assert_eq!(
            encode_entitlements_plist(&plist::Value::String("hi".into())).unwrap(),
            vec![0x0c, 0x02, b'h', b'i']
        );
        assert_eq!(
            encode_entitlements_plist(&plist::Value::Array(vec![plist::Value::Boolean(true)]))
                .unwrap(),
            vec![0x30, 0x03, 0x01, 0x01, 0x01]
        );
    }

    #[test]
    fn unsupported_types_fail() {
        assert!(matches!(
            encode_entitlements_plist(&plist::Value::Real(1.0)),
            Err(CodeSignError::UnsupportedDERType(_))
        ));
        assert!(matches!(
            encode_entitlements_plist(&plist::Value::Data(vec![1, 2, 3])),
            Err(CodeSignError::UnsupportedDERType(_))
        ));
    }

    #[test]
    fn deterministic_for_equal_trees() {
        let a = dict([("k", plist::Value::Integer(1i64.into()))]);
        let b = dict([("k", plist::Value::Integer(1i64.into()))]);
        assert_eq!(
            encode_entitlements_plist(&a).unwrap(),
            encode_entitlements_plist(&b).unwrap()
        );
    }
}
