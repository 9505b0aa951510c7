// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Code directory data structure and related types.

use {
    crate::{
        blob::{read_and_validate_blob_header, Blob, CodeSigningMagic, CodeSigningSlot, Digest, DigestType},
        code_hash::paged_digests,
        error::CodeSignError,
    },
    scroll::{IOwrite, Pread},
    std::{borrow::Cow, collections::HashMap, io::Write, str::FromStr},
};

/// Fixed page size used for code-page hashing. `log2(PAGE_SIZE) == 12`.
pub const PAGE_SIZE: usize = 4096;

bitflags::bitflags! {
    /// Code signature flags.
    ///
    /// These flags are embedded in the Code Directory and govern use of the embedded
    /// signature.
    pub struct CodeSignatureFlags: u32 {
        /// Code may act as a host that controls and supervises guest code.
        const HOST = 0x0001;
        /// The code has been sealed without a signing identity.
        const ADHOC = 0x0002;
        /// Set the "hard" status bit for the code when it starts running.
        const FORCE_HARD = 0x0100;
        /// Implicitly set the "kill" status bit for the code when it starts running.
        const FORCE_KILL = 0x0200;
        /// Force certificate expiration checks.
        const FORCE_EXPIRATION = 0x0400;
        /// Restrict dyld loading.
        const RESTRICT = 0x0800;
        /// Enforce code signing.
        const ENFORCEMENT = 0x1000;
        /// Library validation required.
        const LIBRARY_VALIDATION = 0x2000;
        /// Apply runtime hardening policies.
        const RUNTIME = 0x10000;
        /// The code was automatically signed by the linker.
        ///
        /// This signature should be ignored in any new signing operation.
        const LINKER_SIGNED = 0x20000;
    }
}

impl FromStr for CodeSignatureFlags {
    type Err = CodeSignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(Self::HOST),
            "hard" => Ok(Self::FORCE_HARD),
            "kill" => Ok(Self::FORCE_KILL),
            "expires" => Ok(Self::FORCE_EXPIRATION),
            "library" => Ok(Self::LIBRARY_VALIDATION),
            "runtime" => Ok(Self::RUNTIME),
            "linker-signed" => Ok(Self::LINKER_SIGNED),
            _ => Err(CodeSignError::Builder("unknown code signature flag")),
        }
    }
}

impl CodeSignatureFlags {
    /// Attempt to convert a series of strings into a [CodeSignatureFlags].
    pub fn from_strs(s: &[&str]) -> Result<CodeSignatureFlags, CodeSignError> {
        let mut flags = CodeSignatureFlags::empty();

        for s in s {
            flags |= Self::from_str(s)?;
        }

        Ok(flags)
    }
}

bitflags::bitflags! {
    /// Flags that influence behavior of executable segment.
    pub struct ExecutableSegmentFlags: u64 {
        /// Executable segment belongs to main binary.
        const MAIN_BINARY = 0x0001;
        /// Allow unsigned pages (for debugging).
        const ALLOW_UNSIGNED = 0x0010;
        /// Main binary is debugger.
        const DEBUGGER = 0x0020;
        /// JIT enabled.
        const JIT = 0x0040;
        /// Skip library validation (obsolete).
        const SKIP_LIBRARY_VALIDATION = 0x0080;
        /// Can bless code directory hash for execution.
        const CAN_LOAD_CD_HASH = 0x0100;
        /// Can execute blessed code directory hash.
        const CAN_EXEC_CD_HASH = 0x0200;
    }
}

impl FromStr for ExecutableSegmentFlags {
    type Err = CodeSignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main-binary" => Ok(Self::MAIN_BINARY),
            "allow-unsigned" => Ok(Self::ALLOW_UNSIGNED),
            "debugger" => Ok(Self::DEBUGGER),
            "jit" => Ok(Self::JIT),
            "skip-library-validation" => Ok(Self::SKIP_LIBRARY_VALIDATION),
            "can-load-cd-hash" => Ok(Self::CAN_LOAD_CD_HASH),
            "can-exec-cd-hash" => Ok(Self::CAN_EXEC_CD_HASH),
            _ => Err(CodeSignError::Builder("unknown executable segment flag")),
        }
    }
}

/// Version of Code Directory data structure.
///
/// Each variant corresponds to the version at which a fixed-size suffix was
/// added to the header. Parsing consults this table to know how many tail
/// fields are present; building always targets
/// [CodeDirectoryVersion::SupportsExecutableSegment].
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(u32)]
pub enum CodeDirectoryVersion {
    Initial = 0x20000,
    SupportsScatter = 0x20100,
    SupportsTeamId = 0x20200,
    SupportsCodeLimit64 = 0x20300,
    SupportsExecutableSegment = 0x20400,
    SupportsRuntime = 0x20500,
    SupportsLinkage = 0x20600,
}

fn get_hashes(data: &[u8], offset: usize, count: usize, hash_size: usize) -> Vec<Digest<'_>> {
    data[offset..offset + (count * hash_size)]
        .chunks(hash_size)
        .map(|data| Digest { data: data.into() })
        .collect()
}

/// Inputs to [CodeDirectoryBlob::build].
///
/// One instance of this is built per code directory variant (primary SHA-1,
/// alternate SHA-256); only `alternate` and the digests differ between the
/// two calls a caller makes for a given signing operation.
pub struct CodeDirectoryRequest<'a> {
    /// Whether to build the SHA-256 "alternate" code directory instead of the
    /// legacy SHA-1 primary one.
    pub alternate: bool,
    /// The contiguous code range to hash.
    pub code: &'a [u8],
    /// Pre-computed code-slot hashes to reuse verbatim instead of re-hashing `code`.
    ///
    /// Must be exactly `nCodeSlots * hashSize` bytes when supplied.
    pub existing_code_slots: Option<&'a [u8]>,
    pub exec_seg_base: u64,
    pub exec_seg_limit: u64,
    pub exec_seg_flags: ExecutableSegmentFlags,
    pub bundle_id: &'a str,
    pub team_id: Option<&'a str>,
    pub info_plist_digest: Option<&'a [u8]>,
    pub requirements_digest: Option<&'a [u8]>,
    pub code_resources_digest: Option<&'a [u8]>,
    pub entitlements_digest: Option<&'a [u8]>,
    pub der_entitlements_digest: Option<&'a [u8]>,
    /// Whether this is the main executable of the bundle.
    ///
    /// Governs whether the DER entitlements special slot (and its reserved
    /// neighbor) is eligible to appear at all.
    pub is_execute_arch: bool,
    pub is_adhoc: bool,
}

/// Represents a code directory blob entry.
///
/// This struct is versioned and has been extended over time.
///
/// The struct here represents a superset of all fields in all versions.
///
/// The parser will set `Option<T>` fields to `None` for instances
/// where the version is lower than the version that field was introduced in.
#[derive(Debug)]
pub struct CodeDirectoryBlob<'a> {
    /// Compatibility version.
    pub version: u32,
    /// Setup and mode flags.
    pub flags: CodeSignatureFlags,
    // hash_offset, ident_offset, n_special_slots, and n_code_slots not stored
    // explicitly because they are redundant with derived fields.
    /// Limit to main image signature range.
    ///
    /// This is the file-level offset to stop digesting code data at.
    /// It likely corresponds to the file-offset offset where the
    /// embedded signature data starts in the `__LINKEDIT` segment.
    pub code_limit: u32,
    /// Size of each hash in bytes.
    pub hash_size: u8,
    /// Type of hash.
    pub hash_type: DigestType,
    /// Platform identifier. 0 if not platform binary.
    pub platform: u8,
    /// Page size in bytes. (stored as log u8)
    pub page_size: u32,
    /// Unused (must be 0).
    pub spare2: u32,
    // Version 0x20100
    /// Offset of optional scatter vector. Reserved; never populated by `build`.
    pub scatter_offset: Option<u32>,
    // Version 0x20200
    // team_offset not stored because it is redundant with derived stored str.
    // Version 0x20300
    /// Unused (must be 0).
    pub spare3: Option<u32>,
    /// Limit to main image signature range, 64 bits. Reserved; never populated by `build`.
    pub code_limit_64: Option<u64>,
    // Version 0x20400
    /// Offset of executable segment.
    pub exec_seg_base: Option<u64>,
    /// Limit of executable segment.
    pub exec_seg_limit: Option<u64>,
    /// Executable segment flags.
    pub exec_seg_flags: Option<ExecutableSegmentFlags>,
    // Version 0x20500
    pub runtime: Option<u32>,
    pub pre_encrypt_offset: Option<u32>,
    // Version 0x20600
    pub linkage_hash_type: Option<u8>,
    pub linkage_truncated: Option<u8>,
    pub spare4: Option<u16>,
    pub linkage_offset: Option<u32>,
    pub linkage_size: Option<u32>,

    // End of blob header data / start of derived data.
    pub ident: Cow<'a, str>,
    pub team_name: Option<Cow<'a, str>>,
    pub code_hashes: Vec<Digest<'a>>,
    pub special_hashes: HashMap<CodeSigningSlot, Digest<'a>>,
}

impl<'a> Blob<'a> for CodeDirectoryBlob<'a> {
    fn magic() -> u32 {
        u32::from(CodeSigningMagic::CodeDirectory)
    }

    fn from_blob_bytes(data: &'a [u8]) -> Result<Self, CodeSignError> {
        read_and_validate_blob_header(data, Self::magic(), "code directory blob")?;

        let offset = &mut 8;

        let version = data.gread_with(offset, scroll::BE)?;
        let flags = data.gread_with::<u32>(offset, scroll::BE)?;
        let flags = CodeSignatureFlags::from_bits_truncate(flags);
        let hash_offset = data.gread_with::<u32>(offset, scroll::BE)?;
        let ident_offset = data.gread_with::<u32>(offset, scroll::BE)?;
        let n_special_slots = data.gread_with::<u32>(offset, scroll::BE)?;
        let n_code_slots = data.gread_with::<u32>(offset, scroll::BE)?;
        let code_limit = data.gread_with(offset, scroll::BE)?;
        let hash_size = data.gread_with(offset, scroll::BE)?;
        let hash_type = data.gread_with::<u8>(offset, scroll::BE)?.into();
        let platform = data.gread_with(offset, scroll::BE)?;
        let page_size = data.gread_with::<u8>(offset, scroll::BE)?;
        let page_size = 2u32.pow(page_size as u32);
        let spare2 = data.gread_with(offset, scroll::BE)?;

        if (hash_offset as usize) < *offset
            || (hash_offset as usize) + (n_code_slots as usize * hash_size as usize) > data.len()
        {
            return Err(CodeSignError::TruncatedCodeDirectory(
                "hash offset exceeds slot length",
            ));
        }

        let special_slots_length = hash_size as usize * n_special_slots as usize;
        if special_slots_length > hash_offset as usize {
            return Err(CodeSignError::TruncatedCodeDirectory(
                "special slot count exceeds available header room",
            ));
        }

        let scatter_offset = if version >= CodeDirectoryVersion::SupportsScatter as u32 {
            let v = data.gread_with(offset, scroll::BE)?;

            if v != 0 {
                Some(v)
            } else {
                None
            }
        } else {
            None
        };
        let team_offset = if version >= CodeDirectoryVersion::SupportsTeamId as u32 {
            let v = data.gread_with::<u32>(offset, scroll::BE)?;

            if v != 0 {
                Some(v)
            } else {
                None
            }
        } else {
            None
        };

        let (spare3, code_limit_64) = if version >= CodeDirectoryVersion::SupportsCodeLimit64 as u32
        {
            (
                Some(data.gread_with(offset, scroll::BE)?),
                Some(data.gread_with(offset, scroll::BE)?),
            )
        } else {
            (None, None)
        };

        let (exec_seg_base, exec_seg_limit, exec_seg_flags) =
            if version >= CodeDirectoryVersion::SupportsExecutableSegment as u32 {
                (
                    Some(data.gread_with(offset, scroll::BE)?),
                    Some(data.gread_with(offset, scroll::BE)?),
                    Some(data.gread_with::<u64>(offset, scroll::BE)?),
                )
            } else {
                (None, None, None)
            };

        let exec_seg_flags =
            exec_seg_flags.map(ExecutableSegmentFlags::from_bits_truncate);

        let (runtime, pre_encrypt_offset) =
            if version >= CodeDirectoryVersion::SupportsRuntime as u32 {
                (
                    Some(data.gread_with(offset, scroll::BE)?),
                    Some(data.gread_with(offset, scroll::BE)?),
                )
            } else {
                (None, None)
            };

        let (linkage_hash_type, linkage_truncated, spare4, linkage_offset, linkage_size) =
            if version >= CodeDirectoryVersion::SupportsLinkage as u32 {
                (
                    Some(data.gread_with(offset, scroll::BE)?),
                    Some(data.gread_with(offset, scroll::BE)?),
                    Some(data.gread_with(offset, scroll::BE)?),
                    Some(data.gread_with(offset, scroll::BE)?),
                    Some(data.gread_with(offset, scroll::BE)?),
                )
            } else {
                (None, None, None, None, None)
            };

        // Find trailing null in identifier string.
        let ident = match data
            .get(ident_offset as usize..)
            .ok_or(CodeSignError::MalformedIdentifier)?
            .split(|&b| b == 0)
            .map(std::str::from_utf8)
            .next()
        {
            Some(res) => Cow::from(res.map_err(|_| CodeSignError::MalformedIdentifier)?),
            None => return Err(CodeSignError::MalformedIdentifier),
        };

        let team_name = if let Some(team_offset) = team_offset {
            match data
                .get(team_offset as usize..)
                .ok_or(CodeSignError::MalformedTeamName)?
                .split(|&b| b == 0)
                .map(std::str::from_utf8)
                .next()
            {
                Some(res) => Some(Cow::from(res.map_err(|_| CodeSignError::MalformedTeamName)?)),
                None => return Err(CodeSignError::MalformedTeamName),
            }
        } else {
            None
        };

        let code_hashes = get_hashes(
            data,
            hash_offset as usize,
            n_code_slots as usize,
            hash_size as usize,
        );

        let special_hashes = get_hashes(
            data,
            (hash_offset - (hash_size as u32 * n_special_slots)) as usize,
            n_special_slots as usize,
            hash_size as usize,
        )
        .into_iter()
        .enumerate()
        .map(|(i, h)| (CodeSigningSlot::from(n_special_slots - i as u32), h))
        .collect();

        Ok(Self {
            version,
            flags,
            code_limit,
            hash_size,
            hash_type,
            platform,
            page_size,
            spare2,
            scatter_offset,
            spare3,
            code_limit_64,
            exec_seg_base,
            exec_seg_limit,
            exec_seg_flags,
            runtime,
            pre_encrypt_offset,
            linkage_hash_type,
            linkage_truncated,
            spare4,
            linkage_offset,
            linkage_size,
            ident,
            team_name,
            code_hashes,
            special_hashes,
        })
    }

    fn serialize_payload(&self) -> Result<Vec<u8>, CodeSignError> {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());

        // We need to do this in 2 phases because we don't know the length until
        // we build up the data structure.

        cursor.iowrite_with(self.version, scroll::BE)?;
        cursor.iowrite_with(self.flags.bits, scroll::BE)?;
        let hash_offset_cursor_position = cursor.position();
        cursor.iowrite_with(0u32, scroll::BE)?;
        let ident_offset_cursor_position = cursor.position();
        cursor.iowrite_with(0u32, scroll::BE)?;
        assert_eq!(cursor.position(), 0x10);

        // Hash offsets and counts are wonky. The recorded hash offset is the beginning
        // of code hashes and special hashes are in "negative" indices before
        // that offset. Hashes are also at the index of their CodeSigningSlot constant.
        // e.g. Code Directory is the first element in the specials array because
        // it is slot 0. This means we need to write out empty hashes for missing
        // special slots. Our local specials HashMap may not have all entries. So compute
        // how many specials there should be and write that here. We'll insert placeholder
        // digests later.
        //
        // The highest populated key is equivalent to the size of the front-elided
        // special slot vector the source builds with `find_if`/`erase`: any key we
        // never inserted (because its digest was absent or all-zero) is implicitly
        // the trimmed/zero-filled tail, and the map's max key is always non-zero
        // because insertion skips all-zero digests.
        let highest_slot = self
            .special_hashes
            .keys()
            .map(|slot| u32::from(*slot))
            .max()
            .unwrap_or(0);

        cursor.iowrite_with(highest_slot, scroll::BE)?;
        cursor.iowrite_with(self.code_hashes.len() as u32, scroll::BE)?;
        cursor.iowrite_with(self.code_limit, scroll::BE)?;
        cursor.iowrite_with(self.hash_size, scroll::BE)?;
        cursor.iowrite_with(u8::from(self.hash_type), scroll::BE)?;
        cursor.iowrite_with(self.platform, scroll::BE)?;
        cursor.iowrite_with(self.page_size.trailing_zeros() as u8, scroll::BE)?;
        assert_eq!(cursor.position(), 0x20);
        cursor.iowrite_with(self.spare2, scroll::BE)?;

        let mut team_offset_cursor_position = None;

        if self.version >= CodeDirectoryVersion::SupportsScatter as u32 {
            // Reserved: always emitted as zero regardless of `scatter_offset`.
            cursor.iowrite_with(0u32, scroll::BE)?;

            if self.version >= CodeDirectoryVersion::SupportsTeamId as u32 {
                team_offset_cursor_position = Some(cursor.position());
                cursor.iowrite_with(0u32, scroll::BE)?;

                if self.version >= CodeDirectoryVersion::SupportsCodeLimit64 as u32 {
                    cursor.iowrite_with(self.spare3.unwrap_or(0), scroll::BE)?;
                    assert_eq!(cursor.position(), 0x30);
                    // Reserved: always emitted as zero regardless of `code_limit_64`.
                    cursor.iowrite_with(0u64, scroll::BE)?;

                    if self.version >= CodeDirectoryVersion::SupportsExecutableSegment as u32 {
                        cursor.iowrite_with(self.exec_seg_base.unwrap_or(0), scroll::BE)?;
                        assert_eq!(cursor.position(), 0x40);
                        cursor.iowrite_with(self.exec_seg_limit.unwrap_or(0), scroll::BE)?;
                        cursor.iowrite_with(
                            self.exec_seg_flags
                                .unwrap_or_else(ExecutableSegmentFlags::empty)
                                .bits,
                            scroll::BE,
                        )?;

                        if self.version >= CodeDirectoryVersion::SupportsRuntime as u32 {
                            assert_eq!(cursor.position(), 0x50);
                            cursor.iowrite_with(self.runtime.unwrap_or(0), scroll::BE)?;
                            cursor
                                .iowrite_with(self.pre_encrypt_offset.unwrap_or(0), scroll::BE)?;

                            if self.version >= CodeDirectoryVersion::SupportsLinkage as u32 {
                                cursor.iowrite_with(
                                    self.linkage_hash_type.unwrap_or(0),
                                    scroll::BE,
                                )?;
                                cursor.iowrite_with(
                                    self.linkage_truncated.unwrap_or(0),
                                    scroll::BE,
                                )?;
                                cursor.iowrite_with(self.spare4.unwrap_or(0), scroll::BE)?;
                                cursor
                                    .iowrite_with(self.linkage_offset.unwrap_or(0), scroll::BE)?;
                                assert_eq!(cursor.position(), 0x60);
                                cursor.iowrite_with(self.linkage_size.unwrap_or(0), scroll::BE)?;
                            }
                        }
                    }
                }
            }
        }

        // We've written all the struct fields. Now write variable length fields.

        let identity_offset = cursor.position();
        cursor.write_all(self.ident.as_bytes())?;
        cursor.write_all(b"\0")?;

        let team_offset = cursor.position();
        if team_offset_cursor_position.is_some() {
            if let Some(team_name) = &self.team_name {
                cursor.write_all(team_name.as_bytes())?;
                cursor.write_all(b"\0")?;
            }
        }

        // The boundary conditions are a bit wonky here. We want to go from greatest
        // to smallest, not writing index 0 because that's the first code digest.
        for slot_index in (1..highest_slot + 1).rev() {
            let slot = CodeSigningSlot::from(slot_index);

            if let Some(hash) = self.special_hashes.get(&slot) {
                cursor.write_all(&hash.data)?;
            } else {
                cursor.write_all(&b"\0".repeat(self.hash_size as usize))?;
            }
        }

        let code_hashes_start_offset = cursor.position();

        for hash in &self.code_hashes {
            cursor.write_all(&hash.data)?;
        }

        // Now go back and update the placeholder offsets. We need to add 8 to account
        // for the blob header, which isn't present in this buffer.
        cursor.set_position(hash_offset_cursor_position);
        cursor.iowrite_with(code_hashes_start_offset as u32 + 8, scroll::BE)?;

        cursor.set_position(ident_offset_cursor_position);
        cursor.iowrite_with(identity_offset as u32 + 8, scroll::BE)?;

        if let Some(offset) = team_offset_cursor_position {
            if self.team_name.is_some() {
                cursor.set_position(offset);
                cursor.iowrite_with(team_offset as u32 + 8, scroll::BE)?;
            }
        }

        Ok(cursor.into_inner())
    }
}

impl<'a> CodeDirectoryBlob<'a> {
    /// Build a code directory for the given request.
    ///
    /// Produces either the legacy SHA-1 primary code directory or the SHA-256
    /// alternate, depending on `request.alternate`. Callers build both and feed
    /// their blobs to the CMS signature slot.
    pub fn build(request: &CodeDirectoryRequest<'_>) -> Result<CodeDirectoryBlob<'static>, CodeSignError> {
        if request.code.is_empty() {
            return Err(CodeSignError::EmptyCodeRange);
        }
        if request.bundle_id.is_empty() {
            return Err(CodeSignError::EmptyBundleIdentifier);
        }
        if request.team_id.map(str::is_empty).unwrap_or(true) && !request.is_adhoc {
            return Err(CodeSignError::MissingTeamIdentifier);
        }

        let hash_type = if request.alternate {
            DigestType::Sha256
        } else {
            DigestType::Sha1
        };
        let hash_size = hash_type.hash_len()? as u8;

        let n_code_slots = (request.code.len() + PAGE_SIZE - 1) / PAGE_SIZE;

        let code_hashes = if let Some(existing) = request.existing_code_slots {
            if existing.len() != n_code_slots * hash_size as usize {
                return Err(CodeSignError::Builder(
                    "existing code slot buffer has the wrong length",
                ));
            }
            existing
                .chunks(hash_size as usize)
                .map(|c| Digest::from(c.to_vec()).to_owned())
                .collect::<Vec<_>>()
        } else {
            paged_digests(request.code, hash_type, PAGE_SIZE)?
                .into_iter()
                .map(|v| Digest::from(v).to_owned())
                .collect::<Vec<_>>()
        };

        let mut special_hashes = HashMap::new();

        let mut insert = |slot: CodeSigningSlot, digest: Option<&[u8]>| {
            let bytes = digest
                .map(|d| d.to_vec())
                .unwrap_or_else(|| vec![0u8; hash_size as usize]);

            if bytes.iter().any(|b| *b != 0) {
                special_hashes.insert(slot, Digest::from(bytes).to_owned());
            }
        };

        if request.is_execute_arch {
            insert(CodeSigningSlot::EntitlementsDer, request.der_entitlements_digest);
            // Slot 6 (RepSpecific) is always reserved/empty.
        }
        insert(CodeSigningSlot::Entitlements, request.entitlements_digest);
        // Slot 4 (Application) is always reserved/empty.
        insert(CodeSigningSlot::ResourceDir, request.code_resources_digest);
        insert(CodeSigningSlot::RequirementSet, request.requirements_digest);
        insert(CodeSigningSlot::Info, request.info_plist_digest);

        Ok(CodeDirectoryBlob {
            version: CodeDirectoryVersion::SupportsExecutableSegment as u32,
            flags: if request.is_adhoc {
                CodeSignatureFlags::ADHOC
            } else {
                CodeSignatureFlags::empty()
            },
            code_limit: request.code.len() as u32,
            hash_size,
            hash_type,
            platform: 0,
            page_size: PAGE_SIZE as u32,
            spare2: 0,
            scatter_offset: None,
            spare3: None,
            code_limit_64: None,
            exec_seg_base: Some(request.exec_seg_base),
            exec_seg_limit: Some(request.exec_seg_limit),
            exec_seg_flags: Some(request.exec_seg_flags),
            runtime: None,
            pre_encrypt_offset: None,
            linkage_hash_type: None,
            linkage_truncated: None,
            spare4: None,
            linkage_offset: None,
            linkage_size: None,
            ident: Cow::Owned(request.bundle_id.to_string()),
            team_name: request.team_id.map(|s| Cow::Owned(s.to_string())),
            code_hashes,
            special_hashes,
        })
    }
}

impl<'a> CodeDirectoryBlob<'a> {
    /// Flatten the parsed per-page code digests back into their raw
    /// concatenated form, suitable for [CodeDirectoryRequest::existing_code_slots]
    /// on a later build that wants to avoid re-hashing unchanged code.
    pub fn code_hashes_raw(&self) -> Vec<u8> {
        self.code_hashes
            .iter()
            .flat_map(|digest| digest.data.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_signature_flags_from_str() {
        assert_eq!(
            CodeSignatureFlags::from_str("host").unwrap(),
            CodeSignatureFlags::HOST
        );
        assert_eq!(
            CodeSignatureFlags::from_str("hard").unwrap(),
            CodeSignatureFlags::FORCE_HARD
        );
        assert_eq!(
            CodeSignatureFlags::from_str("kill").unwrap(),
            CodeSignatureFlags::FORCE_KILL
        );
        assert_eq!(
            CodeSignatureFlags::from_str("expires").unwrap(),
            CodeSignatureFlags::FORCE_EXPIRATION
        );
        assert_eq!(
            CodeSignatureFlags::from_str("library").unwrap(),
            CodeSignatureFlags::LIBRARY_VALIDATION
        );
        assert_eq!(
            CodeSignatureFlags::from_str("runtime").unwrap(),
            CodeSignatureFlags::RUNTIME
        );
        assert_eq!(
            CodeSignatureFlags::from_str("linker-signed").unwrap(),
            CodeSignatureFlags::LINKER_SIGNED
        );
    }

    #[test]
    fn adhoc_zero_page_scenario() {
        let code = vec![0u8; 4096];
        let request = CodeDirectoryRequest {
            alternate: false,
            code: &code,
            existing_code_slots: None,
            exec_seg_base: 0,
            exec_seg_limit: 4096,
            exec_seg_flags: ExecutableSegmentFlags::MAIN_BINARY,
            bundle_id: "x",
            team_id: None,
            info_plist_digest: None,
            requirements_digest: None,
            code_resources_digest: None,
            entitlements_digest: None,
            der_entitlements_digest: None,
            is_execute_arch: false,
            is_adhoc: true,
        };

        let cd = CodeDirectoryBlob::build(&request).unwrap();
        assert_eq!(cd.hash_type, DigestType::Sha1);
        assert_eq!(cd.hash_size, 20);
        assert_eq!(cd.code_hashes.len(), 1);
        assert_eq!(
            cd.code_hashes[0].as_hex(),
            "1ceaf73df40e531df3bfb26b4fb7cd95fb7bff1d"
        );
        assert!(cd.special_hashes.is_empty());
        assert!(cd.flags.contains(CodeSignatureFlags::ADHOC));
    }

    #[test]
    fn build_fails_on_empty_code() {
        let request = CodeDirectoryRequest {
            alternate: false,
            code: &[],
            existing_code_slots: None,
            exec_seg_base: 0,
            exec_seg_limit: 0,
            exec_seg_flags: ExecutableSegmentFlags::empty(),
            bundle_id: "x",
            team_id: None,
            info_plist_digest: None,
            requirements_digest: None,
            code_resources_digest: None,
            entitlements_digest: None,
            der_entitlements_digest: None,
            is_execute_arch: false,
            is_adhoc: true,
        };

        assert!(matches!(
            CodeDirectoryBlob::build(&request),
            Err(CodeSignError::EmptyCodeRange)
        ));
    }

    #[test]
    fn build_fails_without_team_id_when_not_adhoc() {
        let code = vec![0u8; 16];
        let request = CodeDirectoryRequest {
            alternate: false,
            code: &code,
            existing_code_slots: None,
            exec_seg_base: 0,
            exec_seg_limit: 0,
            exec_seg_flags: ExecutableSegmentFlags::empty(),
            bundle_id: "x",
            team_id: None,
            info_plist_digest: None,
            requirements_digest: None,
            code_resources_digest: None,
            entitlements_digest: None,
            der_entitlements_digest: None,
            is_execute_arch: false,
            is_adhoc: false,
        };

        assert!(matches!(
            CodeDirectoryBlob::build(&request),
            Err(CodeSignError::MissingTeamIdentifier)
        ));
    }

    #[test]
    fn execute_arch_with_only_info_plist_digest() {
        let code = vec![0u8; 16];
        let info_digest = vec![7u8; 20];
        let request = CodeDirectoryRequest {
            alternate: false,
            code: &code,
            existing_code_slots: None,
            exec_seg_base: 0,
            exec_seg_limit: 16,
            exec_seg_flags: ExecutableSegmentFlags::MAIN_BINARY,
            bundle_id: "x",
            team_id: None,
            info_plist_digest: Some(&info_digest),
            requirements_digest: None,
            code_resources_digest: None,
            entitlements_digest: None,
            der_entitlements_digest: None,
            is_execute_arch: true,
            is_adhoc: true,
        };

        let cd = CodeDirectoryBlob::build(&request).unwrap();
        // Only the Info.plist digest (slot magnitude 1) survives elision.
        assert_eq!(cd.special_hashes.len(), 1);
        assert!(cd.special_hashes.contains_key(&CodeSigningSlot::Info));

        let bytes = cd.to_blob_bytes().unwrap();
        assert_eq!(&bytes[0..4], &[0xfa, 0xde, 0x0c, 0x02]);
    }
}
