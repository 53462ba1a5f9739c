//! Storage-facing records for invoices and signing credentials.
use crate::comprobante::CfdiVersion;
use crate::csd::{Csd, CsdError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle state of a stored invoice.
/// - Generado: built locally, not yet sealed.
/// - Sellado: carries a valid Sello, not yet stamped.
/// - Timbrado: stamped by a PAC (stamping itself happens elsewhere).
/// - Cancelado: cancelled with the tax authority.
/// - Importado: parsed from an externally produced XML.
/// # Examples
/// ```rust
/// use std::str::FromStr;
/// use cfdi_core::record::InvoiceStatus;
///
/// let status = InvoiceStatus::from_str("sellado")?;
/// assert_eq!(status, InvoiceStatus::Sellado);
/// # Ok::<(), cfdi_core::record::StatusParseError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Generado,
    Sellado,
    Timbrado,
    Cancelado,
    Importado,
}

/// Error returned when parsing an [`InvoiceStatus`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusParseError {
    #[error("invalid invoice status: {input}")]
    Invalid { input: String },
}

impl FromStr for InvoiceStatus {
    type Err = StatusParseError;
    fn from_str(status: &str) -> Result<InvoiceStatus, StatusParseError> {
        match status.to_ascii_lowercase().as_str() {
            "generado" => Ok(InvoiceStatus::Generado),
            "sellado" => Ok(InvoiceStatus::Sellado),
            "timbrado" => Ok(InvoiceStatus::Timbrado),
            "cancelado" => Ok(InvoiceStatus::Cancelado),
            "importado" => Ok(InvoiceStatus::Importado),
            _ => Err(StatusParseError::Invalid {
                input: status.to_string(),
            }),
        }
    }
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Generado => "generado",
            InvoiceStatus::Sellado => "sellado",
            InvoiceStatus::Timbrado => "timbrado",
            InvoiceStatus::Cancelado => "cancelado",
            InvoiceStatus::Importado => "importado",
        }
    }
}

/// Stored invoice: the XML as last serialized, plus enough metadata to
/// list and filter without re-parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub xml: String,
    pub version: CfdiVersion,
    pub status: InvoiceStatus,
}

impl InvoiceRecord {
    pub fn new(xml: impl Into<String>, version: CfdiVersion, status: InvoiceStatus) -> Self {
        Self {
            xml: xml.into(),
            version,
            status,
        }
    }
}

/// Stored signing credential: the CSD pair as base64 plus the key
/// password. `no_certificado` caches the certificate serial so records can
/// be matched against sealed documents without loading the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub cer_b64: String,
    pub key_b64: String,
    pub password: String,
    pub no_certificado: Option<String>,
}

impl CredentialRecord {
    pub fn new(
        cer_b64: impl Into<String>,
        key_b64: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            cer_b64: cer_b64.into(),
            key_b64: key_b64.into(),
            password: password.into(),
            no_certificado: None,
        }
    }

    /// Loads and validates the credential, caching the serial on success.
    pub fn load(&mut self) -> Result<Csd, CsdError> {
        let csd = Csd::from_base64(&self.cer_b64, &self.key_b64, &self.password)?;
        self.no_certificado = Some(csd.serial_number().to_string());
        Ok(csd)
    }
}
