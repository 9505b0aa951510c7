// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parsing and length inspection of a complete superblob.
//!
//! The superblob is the outermost `FADE0CC0`-magic structure embedded in a
//! Mach-O binary's `LC_CODE_SIGNATURE` data: a fixed header, an index of
//! `(slot type, offset)` pairs, and the concatenated blob bodies those
//! offsets point into. [parse_superblob] walks that index and dispatches
//! each entry to the per-slot parser in [crate::blob]; [existing_code_slots]
//! and [superblob_length] answer the two narrow questions callers need
//! without fully parsing every blob.

use crate::{
    blob::{
        read_blob_header, BlobData, BlobEntry, BlobIndex, CodeSigningMagic, CodeSigningSlot,
        ParsedBlob,
    },
    code_directory::CodeDirectoryBlob,
    error::CodeSignError,
};
use scroll::Pread;
use std::cmp::Ordering;

/// A slot that failed to parse, recorded alongside the slots that succeeded
/// rather than aborting the whole superblob.
#[derive(Debug)]
pub struct SlotParseError {
    pub index: usize,
    pub slot: CodeSigningSlot,
    pub error: CodeSignError,
}

/// The fully parsed content of a superblob: its header fields plus every
/// slot, parsed into its concrete type.
#[derive(Debug)]
pub struct SuperblobReport<'a> {
    pub magic: CodeSigningMagic,
    pub length: u32,
    pub count: u32,
    pub blobs: Vec<ParsedBlob<'a>>,
    /// Slots whose index entry or content failed to parse. An error here
    /// does not abort iteration over the rest of the index (`spec.md` §7).
    pub errors: Vec<SlotParseError>,
}

impl<'a> SuperblobReport<'a> {
    /// Find the first occurrence of the given slot.
    pub fn find_slot(&self, slot: CodeSigningSlot) -> Option<&ParsedBlob<'a>> {
        self.blobs.iter().find(|b| b.blob_entry.slot == slot)
    }

    /// The primary code directory, if present.
    pub fn code_directory(&self) -> Option<&CodeDirectoryBlob<'a>> {
        match self.find_slot(CodeSigningSlot::CodeDirectory) {
            Some(ParsedBlob {
                blob: BlobData::CodeDirectory(cd),
                ..
            }) => Some(cd),
            _ => None,
        }
    }
}

/// Parse the single slot named by `indices[i]`, clamping its declared length
/// against both the next index entry's offset and the end of `data`.
fn parse_indexed_slot<'a>(
    data: &'a [u8],
    indices: &[BlobIndex],
    i: usize,
) -> Result<ParsedBlob<'a>, CodeSignError> {
    let index = &indices[i];

    let end_offset = if i == indices.len() - 1 {
        data.len()
    } else {
        indices[i + 1].offset as usize
    };

    let full_slice = data
        .get(index.offset as usize..end_offset)
        .ok_or(CodeSignError::SuperblobMalformed)?;
    let (blob_magic, blob_length, _) = read_blob_header(full_slice)?;

    let blob_data = match blob_length.cmp(&full_slice.len()) {
        Ordering::Greater => return Err(CodeSignError::SuperblobMalformed),
        Ordering::Equal => full_slice,
        Ordering::Less => &full_slice[0..blob_length],
    };

    let entry = BlobEntry {
        index: i,
        slot: CodeSigningSlot::from(index.typ),
        offset: index.offset as usize,
        magic: CodeSigningMagic::from(blob_magic),
        length: blob_length,
        data: blob_data,
    };

    ParsedBlob::try_from(entry)
}

/// Parse a superblob's header, index, and every slot's content.
///
/// Each blob's self-reported length is clamped against both the next blob's
/// offset and the end of `data`, so a corrupt or adversarial length field
/// can't be used to read past the buffer. An error decoding one slot's
/// content is recorded in [SuperblobReport::errors] rather than aborting
/// the rest of the index (`spec.md` §7).
pub fn parse_superblob(data: &[u8]) -> Result<SuperblobReport<'_>, CodeSignError> {
    let offset = &mut 0usize;

    let magic: u32 = data.gread_with(offset, scroll::BE)?;
    let magic = CodeSigningMagic::from(magic);

    if magic != CodeSigningMagic::EmbeddedSignature {
        return Err(CodeSignError::BadMagic("embedded signature superblob"));
    }

    let length: u32 = data.gread_with(offset, scroll::BE)?;
    let count: u32 = data.gread_with(offset, scroll::BE)?;

    let mut indices = Vec::with_capacity(count as usize);
    for _ in 0..count {
        indices.push(data.gread_with::<BlobIndex>(offset, scroll::BE)?);
    }

    let mut blobs = Vec::with_capacity(indices.len());
    let mut errors = Vec::new();

    for (i, index) in indices.iter().enumerate() {
        let slot = CodeSigningSlot::from(index.typ);

        match parse_indexed_slot(data, &indices, i) {
            Ok(blob) => blobs.push(blob),
            Err(error) => {
                log::warn!(
                    "failed to parse superblob slot {:?} at index {}: {}",
                    slot,
                    i,
                    error
                );
                errors.push(SlotParseError { index: i, slot, error });
            }
        }
    }

    log::debug!(
        "parsed superblob: {} of {} slots decoded, {} error(s)",
        blobs.len(),
        count,
        errors.len()
    );

    Ok(SuperblobReport {
        magic,
        length,
        count,
        blobs,
        errors,
    })
}

/// The declared length of a superblob, without parsing its contents.
///
/// Returns `0` if `data` doesn't begin with the embedded-signature magic,
/// matching the permissive "not present" convention of reading a
/// `LC_CODE_SIGNATURE` load command that points at the wrong place.
pub fn superblob_length(data: &[u8]) -> u32 {
    let Ok((magic, length, _)) = read_blob_header(data) else {
        return 0;
    };

    if CodeSigningMagic::from(magic) == CodeSigningMagic::EmbeddedSignature {
        length as u32
    } else {
        0
    }
}

/// The existing per-page code-slot hash arrays for the primary (SHA-1) and
/// alternate (SHA-256) code directories, if both are present with non-empty
/// hash arrays.
///
/// Reusing these avoids re-hashing the whole binary when re-signing a
/// Mach-O whose code bytes haven't changed, at the cost of trusting the
/// existing signature's hashes. Returned as owned byte buffers (rather than
/// slices borrowed from the superblob) since they're reconstructed from
/// already-parsed, possibly non-contiguous digests.
pub fn existing_code_slots(report: &SuperblobReport<'_>) -> Option<(Vec<u8>, Vec<u8>)> {
    let primary = match report.find_slot(CodeSigningSlot::CodeDirectory) {
        Some(ParsedBlob {
            blob: BlobData::CodeDirectory(cd),
            ..
        }) if !cd.code_hashes.is_empty() => Some(cd.code_hashes_raw()),
        _ => None,
    }?;

    let alternate = match report.find_slot(CodeSigningSlot::AlternateCodeDirectory0) {
        Some(ParsedBlob {
            blob: BlobData::CodeDirectory(cd),
            ..
        }) if !cd.code_hashes.is_empty() => Some(cd.code_hashes_raw()),
        _ => None,
    }?;

    Some((primary, alternate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        blob::{create_superblob, Blob},
        code_directory::{CodeDirectoryBlob, CodeDirectoryRequest, ExecutableSegmentFlags},
    };

    fn build_adhoc_cd() -> Vec<u8> {
        let request = CodeDirectoryRequest {
            alternate: false,
            code: &[0u8; 4096],
            existing_code_slots: None,
            exec_seg_base: 0,
            exec_seg_limit: 4096,
            exec_seg_flags: ExecutableSegmentFlags::empty(),
            bundle_id: "com.example.app",
            team_id: None,
            info_plist_digest: None,
            requirements_digest: None,
            code_resources_digest: None,
            entitlements_digest: None,
            der_entitlements_digest: None,
            is_execute_arch: false,
            is_adhoc: true,
        };

        CodeDirectoryBlob::build(&request)
            .unwrap()
            .to_blob_bytes()
            .unwrap()
    }

    #[test]
    fn superblob_length_is_zero_for_non_signature_data() {
        assert_eq!(superblob_length(&[0, 1, 2, 3]), 0);
    }

    #[test]
    fn roundtrip_parses_code_directory_slot() {
        let cd_bytes = build_adhoc_cd();
        let blobs = vec![(CodeSigningSlot::CodeDirectory, cd_bytes)];
        let superblob = create_superblob(CodeSigningMagic::EmbeddedSignature, blobs.iter()).unwrap();

        assert_eq!(superblob_length(&superblob) as usize, superblob.len());

        let report = parse_superblob(&superblob).unwrap();
        assert_eq!(report.count, 1);
        assert!(report.code_directory().is_some());
    }

    #[test]
    fn malformed_index_offset_is_recorded_not_fatal() {
        // Surface the log::warn! emitted for the tolerated parse failure
        // below when running with `--nocapture`.
        let _ = env_logger::builder().is_test(true).try_init();

        let mut superblob = {
            let cd_bytes = build_adhoc_cd();
            let blobs = vec![(CodeSigningSlot::CodeDirectory, cd_bytes)];
            create_superblob(CodeSigningMagic::EmbeddedSignature, blobs.iter()).unwrap()
        };

        // Corrupt the single index entry's offset (big-endian, starts right
        // after the 12-byte header and 4-byte slot type) to point past the
        // buffer. A bad slot offset must not abort iteration over the rest
        // of the index (spec.md section 7): the superblob itself still
        // parses, with the failure surfaced in `errors`.
        superblob[16] = 0xff;

        let report = parse_superblob(&superblob).unwrap();
        assert!(report.blobs.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(
            report.errors[0].error,
            CodeSignError::SuperblobMalformed
        ));
    }

    #[test]
    fn one_bad_slot_does_not_prevent_parsing_others() {
        let cd_bytes = build_adhoc_cd();

        // An entitlements slot whose payload is not valid UTF-8 fails to
        // parse, but must not prevent the code directory slot alongside it
        // from being decoded.
        let bad_entitlements: Vec<u8> = {
            let mut v = vec![0xfa, 0xde, 0x71, 0x71, 0x00, 0x00, 0x00, 0x0a];
            v.extend_from_slice(&[0xff, 0xfe]);
            v
        };

        let blobs = vec![
            (CodeSigningSlot::Entitlements, bad_entitlements),
            (CodeSigningSlot::CodeDirectory, cd_bytes),
        ];
        let superblob = create_superblob(CodeSigningMagic::EmbeddedSignature, blobs.iter()).unwrap();

        let report = parse_superblob(&superblob).unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].slot, CodeSigningSlot::Entitlements);
        assert!(matches!(
            report.errors[0].error,
            CodeSignError::EntitlementsBadUtf8(_)
        ));
        assert_eq!(report.blobs.len(), 1);
        assert!(report.code_directory().is_some());
    }
}
