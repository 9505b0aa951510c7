// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `SIGNATURESLOT` (CMS signature) blob.
//!
//! Building this slot assembles the "CDHashes" plist attachment and hands
//! the primary code directory blob off to a pluggable [CmsSigner] capability;
//! this crate never holds key material itself. Parsing renders the signed
//! CMS structure into a diagnostic report: certificate subjects/issuers and
//! signed attributes, including the two Apple-specific CDHashes OIDs and any
//! other attribute surfaced as an opaque, unrecognized entry.

use {
    crate::{
        blob::{read_and_validate_blob_header, BlobWrapperBlob, CodeSigningMagic, Blob},
        error::CodeSignError,
    },
    bcder::{encode::PrimitiveContent, Oid},
    bytes::Bytes,
    cryptographic_message_syntax::{
        asn1::rfc5652::OID_ID_DATA, SignedData, SignedDataBuilder, SignerBuilder,
    },
    std::ops::Deref,
    x509_certificate::{rfc5652::AttributeValue, CapturedX509Certificate, DigestAlgorithm, Sign},
};

/// Canonical empty CMS wrapper, emitted for ad-hoc signatures.
pub const EMPTY_CMS_WRAPPER: &[u8] = &[0xfa, 0xde, 0x0b, 0x01, 0x00, 0x00, 0x00, 0x08];

/// OID for the signed attribute containing the plist of code directory hashes.
///
/// `1.2.840.113635.100.9.1`.
pub const CDHASHES_OID: bcder::ConstOid = Oid(&[42, 134, 72, 134, 247, 99, 100, 9, 1]);

/// OID for the signed attribute containing the SHA-256 code directory digest.
///
/// `1.2.840.113635.100.9.2`.
pub const CDHASHES2_OID: bcder::ConstOid = Oid(&[42, 134, 72, 134, 247, 99, 100, 9, 2]);

/// Truncation length applied to every cdhash transported in CMS attributes.
pub const CDHASH_LENGTH: usize = 20;

/// Capability supplied by the caller: turns a primary code directory blob
/// plus its cdhashes into a DER-encoded CMS `SignedData` structure.
///
/// The engine never embeds key material; implementors of this trait own the
/// signing key and certificate chain.
pub trait CmsSigner {
    fn sign(
        &self,
        primary_code_directory: &[u8],
        cd_hashes_plist: &[u8],
        cd_hash_sha1: &[u8],
        cd_hash_sha256_truncated: &[u8],
    ) -> Result<Vec<u8>, CodeSignError>;
}

/// A [CmsSigner] backed by an X.509 certificate and its signing key.
pub struct CertificateCmsSigner<'a> {
    signing_key: &'a dyn Sign,
    signing_certificate: CapturedX509Certificate,
    extra_certificates: Vec<CapturedX509Certificate>,
}

impl<'a> CertificateCmsSigner<'a> {
    pub fn new(
        signing_key: &'a dyn Sign,
        signing_certificate: CapturedX509Certificate,
        extra_certificates: Vec<CapturedX509Certificate>,
    ) -> Self {
        Self {
            signing_key,
            signing_certificate,
            extra_certificates,
        }
    }
}

impl<'a> CmsSigner for CertificateCmsSigner<'a> {
    fn sign(
        &self,
        primary_code_directory: &[u8],
        cd_hashes_plist: &[u8],
        _cd_hash_sha1: &[u8],
        cd_hash_sha256_truncated: &[u8],
    ) -> Result<Vec<u8>, CodeSignError> {
        let signer = SignerBuilder::new(self.signing_key, self.signing_certificate.clone())
            .message_id_content(primary_code_directory.to_vec())
            .signed_attribute_octet_string(
                Oid(Bytes::copy_from_slice(CDHASHES_OID.as_ref())),
                cd_hashes_plist,
            )
            .signed_attribute(
                Oid(Bytes::copy_from_slice(CDHASHES2_OID.as_ref())),
                vec![AttributeValue::new(bcder::Captured::from_values(
                    bcder::Mode::Der,
                    bcder::encode::sequence((
                        Oid::from(DigestAlgorithm::Sha256).encode_ref(),
                        bcder::OctetString::new(Bytes::copy_from_slice(cd_hash_sha256_truncated))
                            .encode_ref(),
                    )),
                ))],
            );

        let der = SignedDataBuilder::default()
            // Apple uses the `data` content-type in the outer `SignedData`,
            // not `signed-data` as RFC 5652 Section 5 recommends.
            .content_type(Oid(Bytes::copy_from_slice(OID_ID_DATA.as_ref())))
            .signer(signer)
            .certificates(self.extra_certificates.iter().cloned())
            .build_der()
            .map_err(|e| CodeSignError::CMSFailure(e.to_string()))?;

        Ok(der)
    }
}

/// Build the `CDHashes` XML plist attached as a signed CMS attribute.
///
/// Both hashes are truncated to [CDHASH_LENGTH] regardless of the underlying
/// digest's native size.
pub fn build_cdhashes_plist(
    cd_hash_sha1: &[u8],
    cd_hash_sha256: &[u8],
) -> Result<Vec<u8>, CodeSignError> {
    let mut truncated_sha1 = cd_hash_sha1.to_vec();
    truncated_sha1.truncate(CDHASH_LENGTH);
    let mut truncated_sha256 = cd_hash_sha256.to_vec();
    truncated_sha256.truncate(CDHASH_LENGTH);

    let mut dict = plist::Dictionary::new();
    dict.insert(
        "cdhashes".to_string(),
        plist::Value::Array(vec![
            plist::Value::Data(truncated_sha1),
            plist::Value::Data(truncated_sha256),
        ]),
    );

    let mut buffer = Vec::new();
    plist::Value::from(dict)
        .to_writer_xml(&mut buffer)
        .map_err(CodeSignError::Plist)?;
    buffer.push(b'\n');

    Ok(buffer)
}

/// Build the `SIGNATURESLOT` blob.
///
/// If `is_adhoc`, returns the canonical 8-byte empty wrapper and never
/// touches `signer`. Otherwise computes the SHA-1 cdhash of
/// `primary_code_directory` and the truncated SHA-256 cdhash of
/// `alternate_code_directory`, builds the CDHashes plist, invokes `signer`,
/// and wraps the resulting CMS DER bytes in a `BLOBWRAPPER` blob.
pub fn build_cms_signature_blob(
    is_adhoc: bool,
    primary_code_directory: &[u8],
    alternate_code_directory: &[u8],
    signer: &dyn CmsSigner,
) -> Result<Vec<u8>, CodeSignError> {
    if is_adhoc {
        return Ok(EMPTY_CMS_WRAPPER.to_vec());
    }

    let cd_hash_sha1 = crate::blob::DigestType::Sha1.digest_data(primary_code_directory)?;
    let cd_hash_sha256 = crate::blob::DigestType::Sha256Truncated
        .digest_data(alternate_code_directory)?;

    let cd_hashes_plist = build_cdhashes_plist(&cd_hash_sha1, &cd_hash_sha256)?;

    log::debug!(
        "requesting CMS signature over {}-byte primary code directory",
        primary_code_directory.len()
    );

    let der = signer.sign(
        primary_code_directory,
        &cd_hashes_plist,
        &cd_hash_sha1,
        &cd_hash_sha256,
    )?;

    BlobWrapperBlob::from_data_owned(der).to_blob_bytes()
}

/// One signed attribute this crate doesn't otherwise know how to render.
#[derive(Debug, Clone)]
pub struct UnknownAttribute {
    pub oid: String,
    pub name: &'static str,
    pub value_count: usize,
}

/// Diagnostic rendering of signed attributes attached to a `SignerInfo`.
#[derive(Debug, Clone, Default)]
pub struct SignedAttributesReport {
    pub content_type: Option<String>,
    pub signing_time: Option<String>,
    pub message_digest: Option<String>,
    pub cdhashes_plist_xml: Option<String>,
    pub cdhashes2: Vec<String>,
    pub unknown: Vec<UnknownAttribute>,
}

/// One certificate in a CMS signature's certificate set.
#[derive(Debug, Clone)]
pub struct CertificateReport {
    pub subject: String,
    pub issuer: String,
}

/// Diagnostic rendering of a parsed CMS `SignedData` structure.
#[derive(Debug, Clone, Default)]
pub struct CmsSignatureReport {
    pub certificates: Vec<CertificateReport>,
    pub signers: Vec<SignedAttributesReport>,
}

/// Render a certificate's subject/issuer via the `x509-certificate` crate's
/// `Name` formatter, bridging the two crates' distinct certificate types
/// through a DER round-trip.
fn render_certificate(
    cert: &cryptographic_message_syntax::Certificate,
) -> Result<CertificateReport, CodeSignError> {
    let der = cert
        .as_der()
        .map_err(|e| CodeSignError::CMSFailure(e.to_string()))?;
    let captured = CapturedX509Certificate::from_der(der)
        .map_err(|e| CodeSignError::CMSFailure(e.to_string()))?;

    Ok(CertificateReport {
        subject: captured
            .subject_name()
            .user_friendly_str()
            .unwrap_or_else(|_| "<unknown>".to_string()),
        issuer: captured
            .issuer_name()
            .user_friendly_str()
            .unwrap_or_else(|_| "<unknown>".to_string()),
    })
}

fn render_signed_data(signed_data: &SignedData) -> Result<CmsSignatureReport, CodeSignError> {
    let certificates = signed_data
        .certificates()
        .map(render_certificate)
        .collect::<Result<Vec<_>, _>>()?;

    let signers = signed_data
        .signers()
        .map(|signer_info| {
            let mut report = SignedAttributesReport::default();

            if let Some(sa) = signer_info.signed_attributes() {
                report.content_type = Some(sa.content_type().to_string());
                report.message_digest = Some(hex::encode(sa.message_digest()));
                report.signing_time = sa.signing_time().map(|t| format!("{}", t));

                for attr in sa.attributes().iter() {
                    if attr.typ == CDHASHES_OID {
                        if let Some(value) = attr.values.get(0) {
                            let data = value.deref().clone();
                            if let Ok(xml) = data.decode(|cons| {
                                bcder::OctetString::take_from(cons).map(|v| v.into_bytes())
                            }) {
                                report.cdhashes_plist_xml =
                                    Some(String::from_utf8_lossy(&xml).to_string());
                            }
                        }
                    } else if attr.typ == CDHASHES2_OID {
                        report.cdhashes2.push(format!("{}", attr.typ));
                    } else {
                        report.unknown.push(UnknownAttribute {
                            oid: format!("{}", attr.typ),
                            name: "unknown",
                            value_count: attr.values.len(),
                        });
                    }
                }
            }

            report
        })
        .collect();

    Ok(CmsSignatureReport {
        certificates,
        signers,
    })
}

/// Parse the `SIGNATURESLOT` blob into a diagnostic report.
///
/// Returns `Ok(None)` for the canonical empty (ad-hoc) wrapper.
pub fn parse_cms_signature_blob(
    data: &[u8],
) -> Result<Option<CmsSignatureReport>, CodeSignError> {
    let payload =
        read_and_validate_blob_header(data, u32::from(CodeSigningMagic::BlobWrapper), "CMS signature blob")?;

    if payload.is_empty() {
        return Ok(None);
    }

    let signed_data =
        SignedData::parse_ber(payload).map_err(|e| CodeSignError::CMSFailure(e.to_string()))?;

    Ok(Some(render_signed_data(&signed_data)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adhoc_build_is_canonical_empty_wrapper() {
        struct NeverCalled;
        impl CmsSigner for NeverCalled {
            fn sign(&self, _: &[u8], _: &[u8], _: &[u8], _: &[u8]) -> Result<Vec<u8>, CodeSignError> {
                panic!("signer should not be invoked for ad-hoc builds");
            }
        }

        let blob = build_cms_signature_blob(true, &[], &[], &NeverCalled).unwrap();
        assert_eq!(blob, EMPTY_CMS_WRAPPER);
    }

    #[test]
    fn cdhashes_plist_contains_truncated_data_elements() {
        let sha1 = vec![1u8; 20];
        let sha256 = vec![2u8; 32];
        let xml = build_cdhashes_plist(&sha1, &sha256).unwrap();
        let text = String::from_utf8(xml).unwrap();
        assert!(text.contains("cdhashes"));
    }

    #[test]
    fn non_adhoc_build_invokes_signer_with_expected_hash_lengths() {
        struct Capture;
        impl CmsSigner for Capture {
            fn sign(
                &self,
                primary: &[u8],
                plist: &[u8],
                sha1: &[u8],
                sha256_trunc: &[u8],
            ) -> Result<Vec<u8>, CodeSignError> {
                assert_eq!(primary, b"primary-cd");
                assert!(!plist.is_empty());
                assert_eq!(sha1.len(), 20);
                assert_eq!(sha256_trunc.len(), 20);
                Ok(vec![0xde, 0xad, 0xbe, 0xef])
            }
        }

        let blob =
            build_cms_signature_blob(false, b"primary-cd", b"alternate-cd", &Capture).unwrap();
        assert_eq!(&blob[0..4], &[0xfa, 0xde, 0x0b, 0x01]);
        assert_eq!(&blob[8..], &[0xde, 0xad, 0xbe, 0xef]);
    }
}
