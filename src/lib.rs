// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Construction and parsing of Apple embedded code-signature blobs.
//!
//! This crate implements the `FADE0CC0`-magic "superblob" that Apple's
//! `codesign` embeds in Mach-O binaries: the requirements, entitlements, and
//! code directory blobs that make up a signature, and the CMS signature that
//! binds them together.
//!
//! # Features and Capabilities
//!
//! This crate can:
//!
//! * Parse a superblob into its constituent slots. (See [superblob::parse_superblob]
//!   and [blob::BlobData].)
//! * Build a `CodeDirectory` blob, including the dual SHA-1/SHA-256 "alternate"
//!   digest strategy and the version-gated header fields Apple has added over
//!   time. (See [code_directory::CodeDirectoryBlob].)
//! * Build the raw XML and DER-encoded forms of the `entitlements` slot. (See
//!   [entitlements] and [der].)
//! * Build the minimal designated-requirement blob signing tools synthesize
//!   for the `requirements` slot. (See [requirements].)
//! * Assemble a CMS `SignedData` structure over a code directory, given a
//!   caller-supplied signing capability. (See [cms::CmsSigner].)
//!
//! This crate does not:
//!
//! * Parse Mach-O files or locate the `LC_CODE_SIGNATURE` load command within
//!   one. Callers are expected to supply the code-signature bytes directly.
//! * Implement the general code requirement expression language (`csreq`).
//!   Only the one designated-requirement shape signing tools emit is
//!   supported.
//! * Talk to a network: there is no notarization, App Store Connect, or
//!   Time-Stamp Protocol support here.
//!
//! # Getting Started
//!
//! [superblob::parse_superblob] is the entry point for inspecting an existing
//! signature. [code_directory::CodeDirectoryBlob::build] followed by
//! [cms::build_cms_signature_blob] is the entry point for building a new one.

pub mod blob;
pub mod cms;
pub mod code_directory;
pub mod code_hash;
pub mod der;
pub mod entitlements;
mod error;
pub use error::*;
pub mod requirements;
pub mod superblob;
