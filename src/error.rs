// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Unified error type for the code signature blob engine.
#[derive(Debug, Error)]
pub enum CodeSignError {
    #[error("bundle identifier must not be empty")]
    EmptyBundleIdentifier,

    #[error("team identifier is required for non-ad-hoc signatures")]
    MissingTeamIdentifier,

    #[error("code range must have non-zero length")]
    EmptyCodeRange,

    #[error("entitlements data must not be empty")]
    EmptyEntitlements,

    #[error("bad header magic in {0}")]
    BadMagic(&'static str),

    #[error("superblob data is malformed")]
    SuperblobMalformed,

    #[error("code directory is truncated: {0}")]
    TruncatedCodeDirectory(&'static str),

    #[error("malformed identifier string in code directory")]
    MalformedIdentifier,

    #[error("malformed team name string in code directory")]
    MalformedTeamName,

    #[error("unsupported value in entitlements DER tree: {0}")]
    UnsupportedDERType(&'static str),

    #[error("CMS signing failure: {0}")]
    CMSFailure(String),

    #[error("unknown digest algorithm")]
    DigestUnknownAlgorithm,

    #[error("entitlements data not valid UTF-8: {0}")]
    EntitlementsBadUtf8(std::str::Utf8Error),

    #[error("data structure parse error: {0}")]
    Scroll(#[from] scroll::Error),

    #[error("error serializing plist: {0}")]
    Plist(#[from] plist::Error),

    #[error("CMS error: {0}")]
    Cms(#[from] cryptographic_message_syntax::CmsError),

    #[error("X.509 certificate error: {0}")]
    X509(#[from] x509_certificate::X509CertificateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid builder operation: {0}")]
    Builder(&'static str),
}

pub type Result<T> = std::result::Result<T, CodeSignError>;
