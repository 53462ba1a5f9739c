//! Sealing, verification and unsealing of comprobantes.
//!
//! `sellar` runs the full local pipeline: strip any prior signature,
//! write the certificate serial and body onto the root, derive the cadena
//! original, sign it (RSA PKCS#1 v1.5 / SHA-256), apply the three
//! signature attributes as a unit, serialize once, and self-verify before
//! returning. `verificar` re-derives the cadena and performs two distinct
//! checks: byte equality against the cadena captured at signing time
//! (integrity) and cryptographic validation of the Sello (authenticity).
//! Each catches a failure class the other cannot.
//!
//! The cadena original never reads `Sello` or `Certificado`, so
//! re-deriving it from a sealed document is exactly equivalent to
//! stripping those attributes from a copy first; `NoCertificado` stays in
//! place because it is part of what was signed.
use crate::comprobante::cadena::{cadena_original, CadenaError};
use crate::comprobante::xml::XmlError;
use crate::comprobante::{Comprobante, StrippedAttribute};
use crate::csd::Csd;
use base64ct::{Base64, Encoding};
use thiserror::Error;
use tracing::debug;

/// Errors emitted by the sealing and verification pipeline.
#[derive(Debug, Error)]
pub enum SelloError {
    #[error("signing failed: {0}")]
    Signing(#[from] rsa::signature::Error),
    #[error(
        "cadena original mismatch: document was mutated after signing \
         (signed {signed_len} bytes, recomputed {recomputed_len} bytes)"
    )]
    IntegrityMismatch {
        signed: String,
        recomputed: String,
        signed_len: usize,
        recomputed_len: usize,
    },
    #[error("signature does not validate against the certificate")]
    SignatureInvalid,
    #[error("document carries no Sello attribute")]
    MissingSello,
    #[error(transparent)]
    Cadena(#[from] CadenaError),
    #[error(transparent)]
    Xml(#[from] XmlError),
}

/// Result of a successful seal: the sealed document, the exact cadena that
/// was signed, the base64 Sello and the final XML text (serialized exactly
/// once).
#[derive(Debug)]
pub struct Sellado {
    comprobante: Comprobante,
    cadena: String,
    sello: String,
    no_certificado: String,
    xml: String,
}

impl Sellado {
    pub fn comprobante(&self) -> &Comprobante {
        &self.comprobante
    }

    /// The cadena original that was signed, kept for audit and for the
    /// integrity half of later verification.
    pub fn cadena(&self) -> &str {
        &self.cadena
    }

    pub fn sello(&self) -> &str {
        &self.sello
    }

    pub fn no_certificado(&self) -> &str {
        &self.no_certificado
    }

    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn into_comprobante(self) -> Comprobante {
        self.comprobante
    }
}

/// Outcome of a successful verification.
#[derive(Debug)]
pub struct Verificacion {
    pub valid: bool,
    /// Cadena the check ran against (the captured one when supplied).
    pub cadena: String,
    /// Cadena re-derived from the sealed document.
    pub recomputed: String,
}

/// Seals a comprobante with the given CSD.
///
/// Re-sealing an already-sealed document is permitted; it is stripped
/// first so old and new signature material never mix.
///
/// # Examples
/// ```rust,no_run
/// use cfdi_core::comprobante::sello::sellar;
/// use cfdi_core::comprobante::Comprobante;
/// use cfdi_core::csd::Csd;
///
/// let comprobante: Comprobante = unimplemented!();
/// let csd: Csd = unimplemented!();
/// let sellado = sellar(comprobante, &csd)?;
/// assert!(sellado.xml().contains("Sello="));
/// # Ok::<(), cfdi_core::comprobante::sello::SelloError>(())
/// ```
pub fn sellar(mut comprobante: Comprobante, csd: &Csd) -> Result<Sellado, SelloError> {
    comprobante.quitar_sello();

    let no_certificado = csd.serial_number().to_string();
    let certificado = csd.certificate_base64();
    comprobante.asignar_certificado(&no_certificado, &certificado);

    let cadena = cadena_original(&comprobante)?;
    debug!(
        no_certificado = %no_certificado,
        cadena_len = cadena.len(),
        "derived cadena original"
    );

    let firma = csd.sign(cadena.as_bytes())?;
    let sello = Base64::encode_string(&firma);
    comprobante.aplicar_sello(&no_certificado, &certificado, &sello);

    let xml = comprobante.to_xml()?;

    // Self-check before handing the result back: recompute-and-compare
    // plus cryptographic verification.
    verificar(&comprobante, csd, Some(&cadena))?;
    debug!(sello_len = sello.len(), "comprobante sealed and self-verified");

    Ok(Sellado {
        comprobante,
        cadena,
        sello,
        no_certificado,
        xml,
    })
}

/// Verifies a sealed comprobante against a CSD.
///
/// When `cadena_firmada` (captured at signing time) is supplied, the
/// re-derived cadena must match it byte for byte; a mismatch means the
/// document was mutated after signing and is reported as
/// [`SelloError::IntegrityMismatch`], distinct from a signature that
/// simply fails to validate ([`SelloError::SignatureInvalid`]).
pub fn verificar(
    comprobante: &Comprobante,
    csd: &Csd,
    cadena_firmada: Option<&str>,
) -> Result<Verificacion, SelloError> {
    let recomputed = cadena_original(comprobante)?;

    if let Some(signed) = cadena_firmada {
        if signed != recomputed {
            return Err(SelloError::IntegrityMismatch {
                signed_len: signed.len(),
                recomputed_len: recomputed.len(),
                signed: signed.to_string(),
                recomputed,
            });
        }
    }

    let sello = comprobante.sello().ok_or(SelloError::MissingSello)?;
    let compact: String = sello.split_whitespace().collect();
    let firma = Base64::decode_vec(&compact).map_err(|_| SelloError::SignatureInvalid)?;
    if !csd.verify(recomputed.as_bytes(), &firma) {
        return Err(SelloError::SignatureInvalid);
    }

    Ok(Verificacion {
        valid: true,
        cadena: cadena_firmada.unwrap_or(&recomputed).to_string(),
        recomputed,
    })
}

/// Result of an unseal: the restored document, its XML text and the audit
/// list of removed attributes.
#[derive(Debug)]
pub struct Desellado {
    comprobante: Comprobante,
    xml: String,
    stripped: Vec<StrippedAttribute>,
}

impl Desellado {
    pub fn comprobante(&self) -> &Comprobante {
        &self.comprobante
    }

    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn stripped(&self) -> &[StrippedAttribute] {
        &self.stripped
    }

    pub fn into_comprobante(self) -> Comprobante {
        self.comprobante
    }
}

/// Removes the signature attributes and re-serializes the restored
/// document. No cryptography involved; a no-op (not an error) on an
/// already-unsealed document.
pub fn quitar_sello(mut comprobante: Comprobante) -> Result<Desellado, SelloError> {
    let stripped = comprobante.quitar_sello();
    debug!(removed = stripped.len(), "stripped signature attributes");
    let xml = comprobante.to_xml()?;
    Ok(Desellado {
        comprobante,
        xml,
        stripped,
    })
}
