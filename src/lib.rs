//! Rust toolkit for sealing Mexican electronic invoices (CFDI 3.3 / 4.0).
//!
//! The crate covers the local cryptographic sealing pipeline: deriving the
//! canonical "cadena original" for a comprobante, signing it with a CSD
//! (taxpayer certificate + password-protected RSA key), embedding the
//! signature attributes into the XML, verifying a sealed document and
//! unsealing it again. Stamping (timbrado) against the tax authority is a
//! separate concern and is not part of this crate.
//!
//! # Examples
//! ```rust,no_run
//! use cfdi_core::comprobante::sello::sellar;
//! use cfdi_core::comprobante::xml::parse::parse_comprobante;
//! use cfdi_core::csd::Csd;
//!
//! let xml = std::fs::read_to_string("factura.xml")?;
//! let comprobante = parse_comprobante(&xml)?;
//! let csd = Csd::from_base64("...", "...", "password")?;
//! let sellado = sellar(comprobante, &csd)?;
//! println!("{}", sellado.xml());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod comprobante;
pub mod csd;
pub mod record;

use thiserror::Error;

/// Top-level error wrapper for core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Cadena(#[from] comprobante::cadena::CadenaError),
    #[error(transparent)]
    Sello(#[from] comprobante::sello::SelloError),
    #[error(transparent)]
    Csd(#[from] csd::CsdError),
    #[error(transparent)]
    Xml(#[from] comprobante::xml::XmlError),
    #[error(transparent)]
    Parse(#[from] comprobante::xml::parse::ParseError),
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::comprobante::cadena::CadenaError;
    use crate::comprobante::sello::SelloError;
    use crate::comprobante::xml::parse::ParseError;
    use crate::comprobante::xml::XmlError;
    use crate::csd::CsdError;
    use quick_xml::se::SeError;

    #[test]
    fn error_conversions_cover_variants() {
        let err: Error = CadenaError::Malformed {
            detail: "no Conceptos".into(),
        }
        .into();
        assert!(matches!(err, Error::Cadena(_)));

        let err: Error = SelloError::SignatureInvalid.into();
        assert!(matches!(err, Error::Sello(_)));

        let err: Error = CsdError::KeyMismatch.into();
        assert!(matches!(err, Error::Csd(_)));

        let xml_err = XmlError::Serialize {
            source: SeError::Custom("xml".into()),
        };
        let err: Error = xml_err.into();
        assert!(matches!(err, Error::Xml(_)));

        let err: Error = ParseError::MissingElement("Emisor").into();
        assert!(matches!(err, Error::Parse(_)));
    }
}
