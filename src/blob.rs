// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Blob framing primitives common to Apple's embedded code signature format.
//!
//! This module defines the superblob/blob header codec, the magic and slot
//! enumerations, and the [Blob] trait that every concrete slot type
//! implements. There is no official specification for this wire format; the
//! definitions mirror what Apple's `cs_blobs.h` describes and what is
//! observed in the wild.

use {
    crate::error::CodeSignError,
    scroll::{IOwrite, Pread},
    std::{borrow::Cow, cmp::Ordering, io::Write},
};

/// Header magic for the various blob payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CodeSigningMagic {
    /// Single code requirement blob.
    Requirement,
    /// Requirement set blob (used for the `REQUIREMENTS` slot).
    RequirementSet,
    /// CodeDirectory blob.
    CodeDirectory,
    /// Raw XML entitlements blob.
    Entitlements,
    /// DER-encoded entitlements blob.
    EntitlementsDer,
    /// Generic blob wrapper. The CMS signature and notarization ticket are
    /// stored using this magic.
    BlobWrapper,
    /// Top-level embedded signature superblob.
    EmbeddedSignature,
    /// Unrecognized magic, passed through verbatim.
    Unknown(u32),
}

impl From<u32> for CodeSigningMagic {
    fn from(v: u32) -> Self {
        match v {
            0xfade0c00 => Self::Requirement,
            0xfade0c01 => Self::RequirementSet,
            0xfade0c02 => Self::CodeDirectory,
            0xfade7171 => Self::Entitlements,
            0xfade7172 => Self::EntitlementsDer,
            0xfade0b01 => Self::BlobWrapper,
            0xfade0cc0 => Self::EmbeddedSignature,
            _ => Self::Unknown(v),
        }
    }
}

impl From<CodeSigningMagic> for u32 {
    fn from(magic: CodeSigningMagic) -> u32 {
        match magic {
            CodeSigningMagic::Requirement => 0xfade0c00,
            CodeSigningMagic::RequirementSet => 0xfade0c01,
            CodeSigningMagic::CodeDirectory => 0xfade0c02,
            CodeSigningMagic::Entitlements => 0xfade7171,
            CodeSigningMagic::EntitlementsDer => 0xfade7172,
            CodeSigningMagic::BlobWrapper => 0xfade0b01,
            CodeSigningMagic::EmbeddedSignature => 0xfade0cc0,
            CodeSigningMagic::Unknown(v) => v,
        }
    }
}

/// A well-known slot within a superblob's index.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeSigningSlot {
    CodeDirectory,
    Info,
    RequirementSet,
    ResourceDir,
    Application,
    Entitlements,
    RepSpecific,
    EntitlementsDer,
    AlternateCodeDirectory0,
    AlternateCodeDirectory1,
    AlternateCodeDirectory2,
    AlternateCodeDirectory3,
    AlternateCodeDirectory4,
    Signature,
    Identification,
    Ticket,
    Unknown(u32),
}

impl std::fmt::Debug for CodeSigningSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CodeDirectory => write!(f, "CodeDirectory ({})", u32::from(*self)),
            Self::Info => write!(f, "Info ({})", u32::from(*self)),
            Self::RequirementSet => write!(f, "RequirementSet ({})", u32::from(*self)),
            Self::ResourceDir => write!(f, "Resources ({})", u32::from(*self)),
            Self::Application => write!(f, "Application ({})", u32::from(*self)),
            Self::Entitlements => write!(f, "Entitlements ({})", u32::from(*self)),
            Self::RepSpecific => write!(f, "Rep Specific ({})", u32::from(*self)),
            Self::EntitlementsDer => write!(f, "DER Entitlements ({})", u32::from(*self)),
            Self::AlternateCodeDirectory0 => {
                write!(f, "CodeDirectory Alternate #0 ({})", u32::from(*self))
            }
            Self::AlternateCodeDirectory1 => {
                write!(f, "CodeDirectory Alternate #1 ({})", u32::from(*self))
            }
            Self::AlternateCodeDirectory2 => {
                write!(f, "CodeDirectory Alternate #2 ({})", u32::from(*self))
            }
            Self::AlternateCodeDirectory3 => {
                write!(f, "CodeDirectory Alternate #3 ({})", u32::from(*self))
            }
            Self::AlternateCodeDirectory4 => {
                write!(f, "CodeDirectory Alternate #4 ({})", u32::from(*self))
            }
            Self::Signature => write!(f, "CMS Signature ({})", u32::from(*self)),
            Self::Identification => write!(f, "Identification ({})", u32::from(*self)),
            Self::Ticket => write!(f, "Ticket ({})", u32::from(*self)),
            Self::Unknown(value) => write!(f, "Unknown ({})", value),
        }
    }
}

impl From<u32> for CodeSigningSlot {
    fn from(v: u32) -> Self {
        match v {
            0 => Self::CodeDirectory,
            1 => Self::Info,
            2 => Self::RequirementSet,
            3 => Self::ResourceDir,
            4 => Self::Application,
            5 => Self::Entitlements,
            6 => Self::RepSpecific,
            7 => Self::EntitlementsDer,
            0x1000 => Self::AlternateCodeDirectory0,
            0x1001 => Self::AlternateCodeDirectory1,
            0x1002 => Self::AlternateCodeDirectory2,
            0x1003 => Self::AlternateCodeDirectory3,
            0x1004 => Self::AlternateCodeDirectory4,
            0x10000 => Self::Signature,
            0x10001 => Self::Identification,
            0x10002 => Self::Ticket,
            _ => Self::Unknown(v),
        }
    }
}

impl From<CodeSigningSlot> for u32 {
    fn from(v: CodeSigningSlot) -> Self {
        match v {
            CodeSigningSlot::CodeDirectory => 0,
            CodeSigningSlot::Info => 1,
            CodeSigningSlot::RequirementSet => 2,
            CodeSigningSlot::ResourceDir => 3,
            CodeSigningSlot::Application => 4,
            CodeSigningSlot::Entitlements => 5,
            CodeSigningSlot::RepSpecific => 6,
            CodeSigningSlot::EntitlementsDer => 7,
            CodeSigningSlot::AlternateCodeDirectory0 => 0x1000,
            CodeSigningSlot::AlternateCodeDirectory1 => 0x1001,
            CodeSigningSlot::AlternateCodeDirectory2 => 0x1002,
            CodeSigningSlot::AlternateCodeDirectory3 => 0x1003,
            CodeSigningSlot::AlternateCodeDirectory4 => 0x1004,
            CodeSigningSlot::Signature => 0x10000,
            CodeSigningSlot::Identification => 0x10001,
            CodeSigningSlot::Ticket => 0x10002,
            CodeSigningSlot::Unknown(v) => v,
        }
    }
}

impl PartialOrd for CodeSigningSlot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CodeSigningSlot {
    fn cmp(&self, other: &Self) -> Ordering {
        u32::from(*self).cmp(&u32::from(*other))
    }
}

impl CodeSigningSlot {
    /// Whether this slot has external (non-blob) content.
    pub fn has_external_content(&self) -> bool {
        matches!(self, Self::Info | Self::ResourceDir)
    }

    /// Whether this slot can be expressed as a negative-indexed special slot
    /// digest inside a code directory.
    pub fn is_code_directory_specials_expressible(&self) -> bool {
        matches!(
            self,
            Self::Info
                | Self::RequirementSet
                | Self::ResourceDir
                | Self::Application
                | Self::Entitlements
                | Self::RepSpecific
                | Self::EntitlementsDer
        )
    }

    /// Whether this slot is one of the alternate code directory slots.
    pub fn is_alternative_code_directory(&self) -> bool {
        matches!(
            self,
            Self::AlternateCodeDirectory0
                | Self::AlternateCodeDirectory1
                | Self::AlternateCodeDirectory2
                | Self::AlternateCodeDirectory3
                | Self::AlternateCodeDirectory4
        )
    }
}

#[repr(C)]
#[derive(Clone, Pread)]
pub(crate) struct BlobIndex {
    /// Corresponds to a [CodeSigningSlot] variant.
    pub typ: u32,
    pub offset: u32,
}

/// A digest algorithm encountered in code signature data structures.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DigestType {
    None,
    Sha1,
    Sha256,
    Sha256Truncated,
    Unknown(u8),
}

impl Default for DigestType {
    fn default() -> Self {
        Self::Sha256
    }
}

impl From<u8> for DigestType {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::None,
            1 => Self::Sha1,
            2 => Self::Sha256,
            3 => Self::Sha256Truncated,
            _ => Self::Unknown(v),
        }
    }
}

impl From<DigestType> for u8 {
    fn from(v: DigestType) -> u8 {
        match v {
            DigestType::None => 0,
            DigestType::Sha1 => 1,
            DigestType::Sha256 => 2,
            DigestType::Sha256Truncated => 3,
            DigestType::Unknown(v) => v,
        }
    }
}

impl DigestType {
    /// Length in bytes of digests produced by this algorithm.
    pub fn hash_len(&self) -> Result<usize, CodeSignError> {
        Ok(self.digest_data(&[])?.len())
    }

    /// Obtain a hasher for this digest type.
    pub fn as_hasher(&self) -> Result<ring::digest::Context, CodeSignError> {
        match self {
            Self::None | Self::Unknown(_) => Err(CodeSignError::DigestUnknownAlgorithm),
            Self::Sha1 => Ok(ring::digest::Context::new(
                &ring::digest::SHA1_FOR_LEGACY_USE_ONLY,
            )),
            Self::Sha256 | Self::Sha256Truncated => {
                Ok(ring::digest::Context::new(&ring::digest::SHA256))
            }
        }
    }

    /// Digest `data`, truncating to 20 bytes for [DigestType::Sha256Truncated].
    pub fn digest_data(&self, data: &[u8]) -> Result<Vec<u8>, CodeSignError> {
        let mut hasher = self.as_hasher()?;
        hasher.update(data);
        let mut hash = hasher.finish().as_ref().to_vec();

        if matches!(self, Self::Sha256Truncated) {
            hash.truncate(20);
        }

        Ok(hash)
    }
}

pub struct Digest<'a> {
    pub data: Cow<'a, [u8]>,
}

impl<'a> Digest<'a> {
    /// Whether this is the null hash (all zero bytes).
    pub fn is_null(&self) -> bool {
        self.data.iter().all(|b| *b == 0)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    pub fn to_owned(&self) -> Digest<'static> {
        Digest {
            data: Cow::Owned(self.data.clone().into_owned()),
        }
    }

    pub fn as_hex(&self) -> String {
        hex::encode(&self.data)
    }
}

impl<'a> std::fmt::Debug for Digest<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(&self.data))
    }
}

impl<'a> From<Vec<u8>> for Digest<'a> {
    fn from(v: Vec<u8>) -> Self {
        Self { data: v.into() }
    }
}

/// Read the (magic, length) header common to every blob.
///
/// Returns the magic, the declared length (inclusive of the header), and
/// the remaining payload bytes.
pub(crate) fn read_blob_header(data: &[u8]) -> Result<(u32, usize, &[u8]), scroll::Error> {
    let magic = data.pread_with(0, scroll::BE)?;
    let length = data.pread_with::<u32>(4, scroll::BE)?;

    Ok((magic, length as usize, &data[8..]))
}

pub(crate) fn read_and_validate_blob_header<'a>(
    data: &'a [u8],
    expected_magic: u32,
    what: &'static str,
) -> Result<&'a [u8], CodeSignError> {
    let (magic, _, data) = read_blob_header(data)?;

    if magic != expected_magic {
        Err(CodeSignError::BadMagic(what))
    } else {
        Ok(data)
    }
}

/// Build the binary content of a superblob from its constituent (slot, bytes) pairs.
///
/// `blobs` is consumed in order; the resulting index preserves that order.
pub fn create_superblob<'a>(
    magic: CodeSigningMagic,
    blobs: impl Iterator<Item = &'a (CodeSigningSlot, Vec<u8>)>,
) -> Result<Vec<u8>, CodeSignError> {
    let blobs = blobs.collect::<Vec<_>>();

    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());

    let mut blob_data = Vec::new();
    // magic + total length + blob count.
    let mut total_length: u32 = 4 + 4 + 4;
    // 8 bytes for each blob index entry.
    total_length += 8 * blobs.len() as u32;

    let mut indices = Vec::with_capacity(blobs.len());

    for (slot, blob) in blobs {
        blob_data.push(blob);

        indices.push(BlobIndex {
            typ: u32::from(*slot),
            offset: total_length,
        });

        total_length += blob.len() as u32;
    }

    let slot_count = indices.len();

    cursor.iowrite_with(u32::from(magic), scroll::BE)?;
    cursor.iowrite_with(total_length, scroll::BE)?;
    cursor.iowrite_with(slot_count as u32, scroll::BE)?;
    for index in indices {
        cursor.iowrite_with(index.typ, scroll::BE)?;
        cursor.iowrite_with(index.offset, scroll::BE)?;
    }
    for data in blob_data {
        cursor.write_all(data)?;
    }

    let result = cursor.into_inner();
    log::debug!(
        "assembled superblob: {} slot(s), {} byte(s)",
        slot_count,
        result.len()
    );

    Ok(result)
}

/// Provides common (de)serialization for a single blob type.
pub trait Blob<'a>
where
    Self: Sized,
{
    /// The header magic identifying this blob type.
    fn magic() -> u32;

    /// Parse an instance from bytes, including the 8-byte blob header.
    fn from_blob_bytes(data: &'a [u8]) -> Result<Self, CodeSignError>;

    /// Serialize the payload of this blob, excluding the magic/length header.
    fn serialize_payload(&self) -> Result<Vec<u8>, CodeSignError>;

    /// Serialize this blob including its magic/length header.
    fn to_blob_bytes(&self) -> Result<Vec<u8>, CodeSignError> {
        let mut res = Vec::new();
        res.iowrite_with(Self::magic(), scroll::BE)?;

        let payload = self.serialize_payload()?;
        res.iowrite_with(payload.len() as u32 + 8, scroll::BE)?;
        res.extend(payload);

        Ok(res)
    }

    /// Digest this blob's serialized bytes with the given algorithm.
    fn digest_with(&self, hash_type: DigestType) -> Result<Vec<u8>, CodeSignError> {
        hash_type.digest_data(&self.to_blob_bytes()?)
    }
}

/// A single blob as described by a superblob index entry, not yet parsed
/// into its concrete type.
#[derive(Clone)]
pub struct BlobEntry<'a> {
    pub index: usize,
    pub slot: CodeSigningSlot,
    pub offset: usize,
    pub magic: CodeSigningMagic,
    pub length: usize,
    /// Raw data, including the blob's own magic and length header.
    pub data: &'a [u8],
}

impl<'a> std::fmt::Debug for BlobEntry<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("BlobEntry")
            .field("index", &self.index)
            .field("slot", &self.slot)
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("magic", &self.magic)
            .finish()
    }
}

impl<'a> BlobEntry<'a> {
    /// Obtain the payload of this blob, without its own header.
    pub fn payload(&self) -> Result<&'a [u8], CodeSignError> {
        Ok(read_blob_header(self.data)?.2)
    }

    /// Compute the content digest of this blob's full bytes (header included).
    pub fn digest_with(&self, hash: DigestType) -> Result<Vec<u8>, CodeSignError> {
        hash.digest_data(self.data)
    }
}

/// Raw passthrough for the `REQUIREMENTS` slot.
///
/// This crate does not implement the code requirement expression language;
/// the slot is treated as an opaque, already-built byte string (see
/// `requirements::build_requirements_blob`).
pub struct RequirementsBlob<'a> {
    pub data: Cow<'a, [u8]>,
}

impl<'a> Blob<'a> for RequirementsBlob<'a> {
    fn magic() -> u32 {
        u32::from(CodeSigningMagic::RequirementSet)
    }

    fn from_blob_bytes(data: &'a [u8]) -> Result<Self, CodeSignError> {
        let data = read_and_validate_blob_header(data, Self::magic(), "requirements blob")?;
        Ok(Self { data: data.into() })
    }

    fn serialize_payload(&self) -> Result<Vec<u8>, CodeSignError> {
        Ok(self.data.to_vec())
    }
}

impl<'a> std::fmt::Debug for RequirementsBlob<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RequirementsBlob({})", hex::encode(&self.data))
    }
}

/// An XML plist entitlements blob.
#[derive(Debug)]
pub struct EntitlementsBlob<'a> {
    plist: Cow<'a, str>,
}

impl<'a> Blob<'a> for EntitlementsBlob<'a> {
    fn magic() -> u32 {
        u32::from(CodeSigningMagic::Entitlements)
    }

    fn from_blob_bytes(data: &'a [u8]) -> Result<Self, CodeSignError> {
        let data = read_and_validate_blob_header(data, Self::magic(), "entitlements blob")?;
        let s = std::str::from_utf8(data).map_err(CodeSignError::EntitlementsBadUtf8)?;

        Ok(Self { plist: s.into() })
    }

    fn serialize_payload(&self) -> Result<Vec<u8>, CodeSignError> {
        Ok(self.plist.as_bytes().to_vec())
    }
}

impl<'a> EntitlementsBlob<'a> {
    /// Construct an instance wrapping raw XML plist text.
    pub fn from_string(s: &(impl ToString + ?Sized)) -> Self {
        Self {
            plist: s.to_string().into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.plist
    }
}

/// A DER-encoded entitlements blob.
#[derive(Debug)]
pub struct EntitlementsDerBlob<'a> {
    der: Cow<'a, [u8]>,
}

impl<'a> Blob<'a> for EntitlementsDerBlob<'a> {
    fn magic() -> u32 {
        u32::from(CodeSigningMagic::EntitlementsDer)
    }

    fn from_blob_bytes(data: &'a [u8]) -> Result<Self, CodeSignError> {
        let der = read_and_validate_blob_header(data, Self::magic(), "DER entitlements blob")?;
        Ok(Self { der: der.into() })
    }

    fn serialize_payload(&self) -> Result<Vec<u8>, CodeSignError> {
        Ok(self.der.to_vec())
    }
}

impl<'a> EntitlementsDerBlob<'a> {
    /// Construct an instance from a [plist::Value] tree, DER-encoding it
    /// immediately. Errors if the tree contains an unsupported node.
    pub fn from_plist(v: &plist::Value) -> Result<Self, CodeSignError> {
        if crate::entitlements::plist_is_empty(v) {
            return Err(CodeSignError::EmptyEntitlements);
        }

        let der = crate::der::encode_entitlements_plist(v)?;
        Ok(Self { der: der.into() })
    }
}

/// A generic blob wrapper. Used for the CMS signature and notarization ticket slots.
pub struct BlobWrapperBlob<'a> {
    data: Cow<'a, [u8]>,
}

impl<'a> Blob<'a> for BlobWrapperBlob<'a> {
    fn magic() -> u32 {
        u32::from(CodeSigningMagic::BlobWrapper)
    }

    fn from_blob_bytes(data: &'a [u8]) -> Result<Self, CodeSignError> {
        Ok(Self {
            data: read_and_validate_blob_header(data, Self::magic(), "blob wrapper blob")?.into(),
        })
    }

    fn serialize_payload(&self) -> Result<Vec<u8>, CodeSignError> {
        Ok(self.data.to_vec())
    }
}

impl<'a> std::fmt::Debug for BlobWrapperBlob<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.data))
    }
}

impl<'a> BlobWrapperBlob<'a> {
    pub fn from_data_borrowed(data: &'a [u8]) -> BlobWrapperBlob<'a> {
        Self { data: data.into() }
    }
}

impl BlobWrapperBlob<'static> {
    pub fn from_data_owned(data: Vec<u8>) -> BlobWrapperBlob<'static> {
        Self { data: data.into() }
    }
}

/// An unrecognized blob, passed through verbatim.
pub struct OtherBlob<'a> {
    pub magic: u32,
    pub data: &'a [u8],
}

impl<'a> Blob<'a> for OtherBlob<'a> {
    fn magic() -> u32 {
        u32::MAX
    }

    fn from_blob_bytes(data: &'a [u8]) -> Result<Self, CodeSignError> {
        let (magic, _, data) = read_blob_header(data)?;
        Ok(Self { magic, data })
    }

    fn serialize_payload(&self) -> Result<Vec<u8>, CodeSignError> {
        Ok(self.data.to_vec())
    }

    fn to_blob_bytes(&self) -> Result<Vec<u8>, CodeSignError> {
        let mut res = Vec::with_capacity(self.data.len() + 8);
        res.iowrite_with(self.magic, scroll::BE)?;
        res.iowrite_with(self.data.len() as u32 + 8, scroll::BE)?;
        res.write_all(self.data)?;

        Ok(res)
    }
}

impl<'a> std::fmt::Debug for OtherBlob<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.data))
    }
}

/// The parsed content of one slot in a superblob.
#[derive(Debug)]
pub enum BlobData<'a> {
    Requirements(Box<RequirementsBlob<'a>>),
    CodeDirectory(Box<crate::code_directory::CodeDirectoryBlob<'a>>),
    Entitlements(Box<EntitlementsBlob<'a>>),
    EntitlementsDer(Box<EntitlementsDerBlob<'a>>),
    BlobWrapper(Box<BlobWrapperBlob<'a>>),
    Other(Box<OtherBlob<'a>>),
}

impl<'a> Blob<'a> for BlobData<'a> {
    fn magic() -> u32 {
        u32::MAX
    }

    fn from_blob_bytes(data: &'a [u8]) -> Result<Self, CodeSignError> {
        let (magic, length, _) = read_blob_header(data)?;
        let data = &data[0..length];
        let magic = CodeSigningMagic::from(magic);

        Ok(match magic {
            CodeSigningMagic::RequirementSet => {
                Self::Requirements(Box::new(RequirementsBlob::from_blob_bytes(data)?))
            }
            CodeSigningMagic::CodeDirectory => Self::CodeDirectory(Box::new(
                crate::code_directory::CodeDirectoryBlob::from_blob_bytes(data)?,
            )),
            CodeSigningMagic::Entitlements => {
                Self::Entitlements(Box::new(EntitlementsBlob::from_blob_bytes(data)?))
            }
            CodeSigningMagic::EntitlementsDer => {
                Self::EntitlementsDer(Box::new(EntitlementsDerBlob::from_blob_bytes(data)?))
            }
            CodeSigningMagic::BlobWrapper => {
                Self::BlobWrapper(Box::new(BlobWrapperBlob::from_blob_bytes(data)?))
            }
            _ => Self::Other(Box::new(OtherBlob::from_blob_bytes(data)?)),
        })
    }

    fn serialize_payload(&self) -> Result<Vec<u8>, CodeSignError> {
        match self {
            Self::Requirements(b) => b.serialize_payload(),
            Self::CodeDirectory(b) => b.serialize_payload(),
            Self::Entitlements(b) => b.serialize_payload(),
            Self::EntitlementsDer(b) => b.serialize_payload(),
            Self::BlobWrapper(b) => b.serialize_payload(),
            Self::Other(b) => b.serialize_payload(),
        }
    }

    fn to_blob_bytes(&self) -> Result<Vec<u8>, CodeSignError> {
        match self {
            Self::Requirements(b) => b.to_blob_bytes(),
            Self::CodeDirectory(b) => b.to_blob_bytes(),
            Self::Entitlements(b) => b.to_blob_bytes(),
            Self::EntitlementsDer(b) => b.to_blob_bytes(),
            Self::BlobWrapper(b) => b.to_blob_bytes(),
            Self::Other(b) => b.to_blob_bytes(),
        }
    }
}

/// The parsed content of a blob entry, joining its index metadata with its
/// concrete type.
#[derive(Debug)]
pub struct ParsedBlob<'a> {
    pub blob_entry: BlobEntry<'a>,
    pub blob: BlobData<'a>,
}

impl<'a> ParsedBlob<'a> {
    pub fn digest_with(&self, hash: DigestType) -> Result<Vec<u8>, CodeSignError> {
        hash.digest_data(self.blob_entry.data)
    }
}

impl<'a> TryFrom<BlobEntry<'a>> for ParsedBlob<'a> {
    type Error = CodeSignError;

    fn try_from(blob_entry: BlobEntry<'a>) -> Result<Self, Self::Error> {
        let blob = BlobData::from_blob_bytes(blob_entry.data)?;
        Ok(Self { blob_entry, blob })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_round_trips() {
        for magic in [
            CodeSigningMagic::Requirement,
            CodeSigningMagic::RequirementSet,
            CodeSigningMagic::CodeDirectory,
            CodeSigningMagic::Entitlements,
            CodeSigningMagic::EntitlementsDer,
            CodeSigningMagic::BlobWrapper,
            CodeSigningMagic::EmbeddedSignature,
        ] {
            let v = u32::from(magic);
            assert_eq!(CodeSigningMagic::from(v), magic);
        }
    }

    #[test]
    fn empty_cms_wrapper_is_blob_wrapper_magic() {
        let empty = [0xfau8, 0xde, 0x0b, 0x01, 0x00, 0x00, 0x00, 0x08];
        let (magic, length, payload) = read_blob_header(&empty).unwrap();
        assert_eq!(CodeSigningMagic::from(magic), CodeSigningMagic::BlobWrapper);
        assert_eq!(length, 8);
        assert!(payload.is_empty());
    }
}
