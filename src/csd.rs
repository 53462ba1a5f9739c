//! CSD credential loading and raw RSA signing.
//!
//! A CSD (Certificado de Sello Digital) is the taxpayer's signing
//! credential: an X.509 certificate plus a password-protected RSA private
//! key, distributed by the SAT as DER blobs. [`Csd`] loads both, checks
//! that they belong together, and exposes the derived facts the sealing
//! pipeline needs (serial, RFC, validity window) together with raw
//! PKCS#1 v1.5 / SHA-256 sign and verify operations.
//!
//! Expired certificates load and sign normally: expiry is a business rule
//! for the tax authority, not a reason to refuse a local cryptographic
//! operation. [`Csd::is_expired_at`] reports it as metadata.
use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use pkcs8::EncryptedPrivateKeyInfo;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;
use x509_cert::der::asn1::ObjectIdentifier;
use x509_cert::der::{Decode, Encode};
use x509_cert::Certificate;

// Subject RDN attribute types used by SAT-issued certificates. The RFC
// (and, for physical persons, the CURP) live in x500UniqueIdentifier.
const OID_X500_UNIQUE_IDENTIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.45");
const OID_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const OID_ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");

const PAIR_PROBE: &[u8] = b"cfdi-core csd pair probe";

/// Errors that can occur while loading or using a CSD.
#[derive(Debug, Error)]
pub enum CsdError {
    #[error("invalid certificate: {detail}")]
    InvalidCertificate { detail: String },
    #[error("invalid private key: {detail}")]
    InvalidPrivateKey { detail: String },
    #[error("private key does not match the certificate's public key")]
    KeyMismatch,
}

/// A loaded CSD credential: certificate, decrypted private key and the
/// facts derived from them.
///
/// Constructed fresh per signing operation; never cached or mutated.
///
/// # Examples
/// ```rust,no_run
/// use cfdi_core::csd::Csd;
///
/// let cer = std::fs::read("csd.cer")?;
/// let key = std::fs::read("csd.key")?;
/// let csd = Csd::from_der(&cer, &key, "12345678a")?;
/// assert_eq!(csd.serial_number().len(), 20);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Csd {
    certificate_der: Vec<u8>,
    signing_key: SigningKey<Sha256>,
    verifying_key: VerifyingKey<Sha256>,
    serial: String,
    rfc: String,
    legal_name: String,
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
}

impl Csd {
    /// Loads a CSD from base64-encoded certificate and key bytes, the form
    /// they take in a stored credential record. Whitespace inside the
    /// base64 (line wrapping) is tolerated.
    pub fn from_base64(cert_b64: &str, key_b64: &str, password: &str) -> Result<Self, CsdError> {
        let cert_der = decode_b64(cert_b64).map_err(|detail| CsdError::InvalidCertificate {
            detail: format!("bad base64: {detail}"),
        })?;
        let key_der = decode_b64(key_b64).map_err(|detail| CsdError::InvalidPrivateKey {
            detail: format!("bad base64: {detail}"),
        })?;
        Self::from_der(&cert_der, &key_der, password)
    }

    /// Loads a CSD from raw DER certificate and key bytes.
    ///
    /// The key may be an encrypted PKCS#8 blob (the SAT `.key` format,
    /// decrypted with `password`), a plain PKCS#8 key or a plain PKCS#1
    /// key. After parsing, the pair is checked by signing a probe value
    /// and verifying it against the certificate's public key; formats
    /// differ, so raw key bytes are never compared.
    pub fn from_der(cert_der: &[u8], key_der: &[u8], password: &str) -> Result<Self, CsdError> {
        let certificate =
            Certificate::from_der(cert_der).map_err(|e| CsdError::InvalidCertificate {
                detail: format!("DER parse error: {e}"),
            })?;
        let private_key = parse_private_key(key_der, password)?;

        let spki_der = certificate
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| CsdError::InvalidCertificate {
                detail: format!("unreadable subject public key: {e}"),
            })?;
        let public_key =
            RsaPublicKey::from_public_key_der(&spki_der).map_err(|e| {
                CsdError::InvalidCertificate {
                    detail: format!("certificate public key is not RSA: {e}"),
                }
            })?;

        let signing_key = SigningKey::<Sha256>::new(private_key);
        let verifying_key = VerifyingKey::<Sha256>::new(public_key);

        let probe_sig = signing_key
            .try_sign(PAIR_PROBE)
            .map_err(|e| CsdError::InvalidPrivateKey {
                detail: format!("probe signature failed: {e}"),
            })?;
        if verifying_key.verify(PAIR_PROBE, &probe_sig).is_err() {
            return Err(CsdError::KeyMismatch);
        }

        let serial = serial_to_string(certificate.tbs_certificate.serial_number.as_bytes());
        let (rfc, legal_name) = subject_identity(&certificate);
        let valid_from: DateTime<Utc> = certificate
            .tbs_certificate
            .validity
            .not_before
            .to_system_time()
            .into();
        let valid_to: DateTime<Utc> = certificate
            .tbs_certificate
            .validity
            .not_after
            .to_system_time()
            .into();

        let csd = Self {
            certificate_der: cert_der.to_vec(),
            signing_key,
            verifying_key,
            serial,
            rfc,
            legal_name,
            valid_from,
            valid_to,
        };
        if csd.is_expired_at(Utc::now()) {
            warn!(
                serial = %csd.serial,
                valid_to = %csd.valid_to,
                "CSD certificate is expired; signing proceeds, stamping will be rejected"
            );
        }
        Ok(csd)
    }

    /// Certificate serial as the 20-digit string the `NoCertificado`
    /// attribute expects.
    pub fn serial_number(&self) -> &str {
        &self.serial
    }

    /// Taxpayer RFC from the certificate subject.
    pub fn rfc(&self) -> &str {
        &self.rfc
    }

    /// Legal name from the certificate subject.
    pub fn legal_name(&self) -> &str {
        &self.legal_name
    }

    pub fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    pub fn valid_to(&self) -> DateTime<Utc> {
        self.valid_to
    }

    /// Expiry as metadata, never an error.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.valid_to
    }

    /// Raw DER certificate bytes, as loaded.
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    /// Certificate bytes as unframed base64, the form the `Certificado`
    /// attribute carries.
    pub fn certificate_base64(&self) -> String {
        Base64::encode_string(&self.certificate_der)
    }

    /// Signs `message` with RSA PKCS#1 v1.5 over a SHA-256 digest.
    /// Deterministic: identical input yields identical bytes.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, rsa::signature::Error> {
        Ok(self.signing_key.try_sign(message)?.to_vec())
    }

    /// Verifies `signature` over `message` against the certificate's
    /// public key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match Signature::try_from(signature) {
            Ok(sig) => self.verifying_key.verify(message, &sig).is_ok(),
            Err(_) => false,
        }
    }
}

fn decode_b64(input: &str) -> Result<Vec<u8>, String> {
    let compact: String = input.split_whitespace().collect();
    Base64::decode_vec(&compact).map_err(|e| e.to_string())
}

fn parse_private_key(key_der: &[u8], password: &str) -> Result<RsaPrivateKey, CsdError> {
    if let Ok(encrypted) = EncryptedPrivateKeyInfo::try_from(key_der) {
        let document =
            encrypted
                .decrypt(password.as_bytes())
                .map_err(|e| CsdError::InvalidPrivateKey {
                    detail: format!("decryption failed (wrong password?): {e}"),
                })?;
        return RsaPrivateKey::from_pkcs8_der(document.as_bytes()).map_err(|e| {
            CsdError::InvalidPrivateKey {
                detail: format!("decrypted key is not a PKCS#8 RSA key: {e}"),
            }
        });
    }
    RsaPrivateKey::from_pkcs8_der(key_der)
        .or_else(|_| RsaPrivateKey::from_pkcs1_der(key_der))
        .map_err(|e| CsdError::InvalidPrivateKey {
            detail: format!("not an encrypted, PKCS#8 or PKCS#1 RSA key: {e}"),
        })
}

/// SAT serials encode the 20 decimal digits as the ASCII bytes of the DER
/// serial integer. Anything else falls back to plain decimal rendering.
fn serial_to_string(bytes: &[u8]) -> String {
    if !bytes.is_empty() && bytes.iter().all(u8::is_ascii_digit) {
        return bytes.iter().map(|b| *b as char).collect();
    }
    serial_bytes_to_decimal_string(bytes)
}

fn serial_bytes_to_decimal_string(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "0".to_string();
    }

    let mut digits: Vec<u8> = vec![0];
    for &byte in bytes {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            let value = (*digit as u32) * 256 + carry;
            *digit = (value % 10) as u8;
            carry = value / 10;
        }
        while carry > 0 {
            digits.push((carry % 10) as u8);
            carry /= 10;
        }
    }

    while digits.len() > 1 && matches!(digits.last(), Some(0)) {
        digits.pop();
    }

    digits.iter().rev().map(|d| (b'0' + *d) as char).collect()
}

fn subject_identity(certificate: &Certificate) -> (String, String) {
    let mut rfc = String::new();
    let mut common_name = String::new();
    let mut organization = String::new();

    for rdn in certificate.tbs_certificate.subject.0.iter() {
        for atv in rdn.0.iter() {
            let text = attribute_text(atv.value.value());
            if atv.oid == OID_X500_UNIQUE_IDENTIFIER {
                // Value may be "RFC / CURP"; the RFC comes first.
                rfc = text
                    .split('/')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();
            } else if atv.oid == OID_COMMON_NAME {
                common_name = text;
            } else if atv.oid == OID_ORGANIZATION {
                organization = text;
            }
        }
    }

    let legal_name = if common_name.is_empty() {
        organization
    } else {
        common_name
    };
    (rfc, legal_name)
}

// Attribute values come as UTF8String or PrintableString content bytes;
// a stray BIT STRING unused-bits prefix shows up as a control byte.
fn attribute_text(content: &[u8]) -> String {
    String::from_utf8_lossy(content)
        .trim_matches(|c: char| c.is_control())
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_bytes_to_decimal_handles_large_values() {
        assert_eq!(serial_bytes_to_decimal_string(&[0x01]), "1");
        assert_eq!(serial_bytes_to_decimal_string(&[0x01, 0x00]), "256");
        assert_eq!(serial_bytes_to_decimal_string(&[0x00, 0x01]), "1");
        assert_eq!(serial_bytes_to_decimal_string(&[0xFF, 0xFF]), "65535");
    }

    #[test]
    fn ascii_digit_serials_decode_as_text() {
        assert_eq!(
            serial_to_string(b"30001000000400002434"),
            "30001000000400002434"
        );
        // non-ASCII serial falls back to decimal rendering
        assert_eq!(serial_to_string(&[0x01, 0x00]), "256");
    }

    #[test]
    fn attribute_text_drops_control_prefixes() {
        assert_eq!(attribute_text(b"\x00EKU9003173C9"), "EKU9003173C9");
        assert_eq!(attribute_text(b"  EKU9003173C9 "), "EKU9003173C9");
    }
}
