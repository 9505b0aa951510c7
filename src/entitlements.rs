// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entitlements slots: the raw XML plist form and its DER-encoded sibling.
//!
//! Building both slots is a thin wrapper around [crate::blob::EntitlementsBlob]
//! and [crate::blob::EntitlementsDerBlob]; this module supplies the shared
//! emptiness check the DER builder uses to reject an empty entitlements tree,
//! and the [Blob::to_blob_bytes] convenience entry points callers reach for.

use crate::{
    blob::{Blob, EntitlementsBlob, EntitlementsDerBlob},
    error::CodeSignError,
};

/// Whether a parsed plist value should be treated as "no entitlements".
///
/// Only an empty dictionary or empty array count; a boolean, string, or
/// number at the root is a (degenerate but non-empty) entitlements document.
pub fn plist_is_empty(v: &plist::Value) -> bool {
    match v {
        plist::Value::Dictionary(d) => d.is_empty(),
        plist::Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

/// Build the raw XML `ENTITLEMENTS` slot, wrapping `xml` unchanged.
pub fn build_entitlements_blob(xml: &str) -> Result<Vec<u8>, CodeSignError> {
    EntitlementsBlob::from_string(xml).to_blob_bytes()
}

/// Build the `DER_ENTITLEMENTS` slot from a parsed plist tree.
///
/// Fails with [CodeSignError::EmptyEntitlements] if `value` is empty.
pub fn build_der_entitlements_blob(value: &plist::Value) -> Result<Vec<u8>, CodeSignError> {
    EntitlementsDerBlob::from_plist(value)?.to_blob_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_dictionary_is_empty() {
        assert!(plist_is_empty(&plist::Value::Dictionary(
            plist::Dictionary::new()
        )));
    }

    #[test]
    fn non_empty_dictionary_is_not_empty() {
        let mut d = plist::Dictionary::new();
        d.insert("get-task-allow".to_string(), plist::Value::Boolean(true));
        assert!(!plist_is_empty(&plist::Value::Dictionary(d)));
    }

    #[test]
    fn xml_entitlements_roundtrip_via_blob() {
        let xml = "<?xml version=\"1.0\"?><plist><dict/></plist>";
        let blob = build_entitlements_blob(xml).unwrap();
        assert_eq!(&blob[0..4], &[0xfa, 0xde, 0x71, 0x71]);
        assert_eq!(
            u32::from_be_bytes(blob[4..8].try_into().unwrap()) as usize,
            blob.len()
        );
        assert_eq!(&blob[8..], xml.as_bytes());
    }

    #[test]
    fn der_entitlements_rejects_empty_tree() {
        let empty = plist::Value::Dictionary(plist::Dictionary::new());
        assert!(matches!(
            build_der_entitlements_blob(&empty),
            Err(CodeSignError::EmptyEntitlements)
        ));
    }

    #[test]
    fn der_entitlements_wraps_non_empty_tree() {
        let mut d = plist::Dictionary::new();
        d.insert("get-task-allow".to_string(), plist::Value::Boolean(true));
        let blob = build_der_entitlements_blob(&plist::Value::Dictionary(d)).unwrap();
        assert_eq!(&blob[0..4], &[0xfa, 0xde, 0x71, 0x72]);
        assert_eq!(
            u32::from_be_bytes(blob[4..8].try_into().unwrap()) as usize,
            blob.len()
        );
    }
}
