// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `REQUIREMENTS` slot: a minimal `designated => ...` requirement blob.
//!
//! This crate does not implement the code requirement expression language in
//! general (parsing, compiling, or decompiling arbitrary `csreq` expressions).
//! It only ever needs to emit the one designated-requirement expression
//! signing tools synthesize: "anchor apple generic and identifier = BUNDLE
//! and subject.CN = CN". The byte layout below is reproduced verbatim from
//! observed `csreq`-compiled output.

/// Canonical empty requirements blob, emitted when either the bundle
/// identifier or the signing certificate's subject common name is absent.
pub const EMPTY_REQUIREMENTS_BLOB: &[u8] = &[
    0xfa, 0xde, 0x0c, 0x01, 0x00, 0x00, 0x00, 0x0c, 0x00, 0x00, 0x00, 0x00,
];

const PACK1: &[u8] = &[
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x14,
];
const PACK2: &[u8] = &[
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0x02,
];
const PACK3: &[u8] = &[
    0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0x0f, 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0x0b,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0a, b's', b'u', b'b', b'j', b'e', b'c', b't', b'.',
    b'C', b'N', 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
];
const PACK4: &[u8] = &[
    0x00, 0x00, 0x00, 0x0e, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x0a, 0x2a, 0x86, 0x48, 0x86,
    0xf7, 0x63, 0x64, 0x06, 0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Pad `s` with NUL bytes up to the next 4-byte boundary.
fn pad4(s: &str) -> Vec<u8> {
    let mut v = s.as_bytes().to_vec();
    let remainder = v.len() % 4;
    if remainder != 0 {
        v.resize(v.len() + (4 - remainder), 0);
    }
    v
}

/// Build the `REQUIREMENTS` slot for a designated requirement binding
/// `bundle_id` and `subject_cn`.
///
/// Returns the canonical empty requirements blob if either string is empty,
/// matching the behavior of ad-hoc and otherwise-identity-less signing
/// operations. The returned bytes are the complete slot, including its own
/// `FADE0C01` magic and length header.
pub fn build_requirements_blob(bundle_id: &str, subject_cn: &str) -> Vec<u8> {
    if bundle_id.is_empty() || subject_cn.is_empty() {
        return EMPTY_REQUIREMENTS_BLOB.to_vec();
    }

    let padded_bundle_id = pad4(bundle_id);
    let padded_subject_cn = pad4(subject_cn);

    let mut inner = Vec::new();
    inner.extend_from_slice(PACK2);
    inner.extend_from_slice(&(bundle_id.len() as u32).to_be_bytes());
    inner.extend_from_slice(&padded_bundle_id);
    inner.extend_from_slice(PACK3);
    inner.extend_from_slice(&(subject_cn.len() as u32).to_be_bytes());
    inner.extend_from_slice(&padded_subject_cn);
    inner.extend_from_slice(PACK4);

    let inner_length = 4 + 4 + inner.len() as u32;

    let mut outer = Vec::new();
    outer.extend_from_slice(PACK1);
    outer.extend_from_slice(&[0xfa, 0xde, 0x0c, 0x00]);
    outer.extend_from_slice(&inner_length.to_be_bytes());
    outer.extend_from_slice(&inner);

    let outer_length = 4 + 4 + outer.len() as u32;

    let mut out = Vec::with_capacity(outer_length as usize);
    out.extend_from_slice(&[0xfa, 0xde, 0x0c, 0x01]);
    out.extend_from_slice(&outer_length.to_be_bytes());
    out.extend_from_slice(&outer);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bundle_id_yields_canonical_empty_blob() {
        assert_eq!(build_requirements_blob("", "Apple Inc"), EMPTY_REQUIREMENTS_BLOB);
    }

    #[test]
    fn empty_subject_cn_yields_canonical_empty_blob() {
        assert_eq!(build_requirements_blob("com.example.app", ""), EMPTY_REQUIREMENTS_BLOB);
    }

    #[test]
    fn non_empty_inputs_produce_framed_superblob() {
        let blob = build_requirements_blob("com.example.app", "Apple Development: Jane Doe");
        assert_eq!(&blob[0..4], &[0xfa, 0xde, 0x0c, 0x01]);

        let declared_len = u32::from_be_bytes(blob[4..8].try_into().unwrap());
        assert_eq!(declared_len as usize, blob.len());

        // Inner requirement blob immediately follows pack1.
        let inner_offset = 8 + PACK1.len();
        assert_eq!(&blob[inner_offset..inner_offset + 4], &[0xfa, 0xde, 0x0c, 0x00]);
    }

    #[test]
    fn bundle_id_is_nul_padded_to_four_bytes() {
        let blob = build_requirements_blob("abc", "x");
        // "abc" (3 bytes) pads to 4 bytes with one NUL.
        let ident_len_offset = 8 + PACK1.len() + 4 + 4 + PACK2.len();
        let stored_len =
            u32::from_be_bytes(blob[ident_len_offset..ident_len_offset + 4].try_into().unwrap());
        assert_eq!(stored_len, 3);

        let bytes_start = ident_len_offset + 4;
        assert_eq!(&blob[bytes_start..bytes_start + 4], b"abc\0");
    }
}
