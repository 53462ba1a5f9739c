//! Comprobante (CFDI invoice) domain types.
pub mod cadena;
pub mod sello;
pub mod xml;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// CFDI schema version a comprobante is expressed in.
///
/// The version drives the token order of the cadena original and the
/// namespace the XML is serialized under.
///
/// # Examples
/// ```rust
/// use std::str::FromStr;
/// use cfdi_core::comprobante::CfdiVersion;
///
/// let v = CfdiVersion::from_str("4.0")?;
/// assert_eq!(v.as_str(), "4.0");
/// # Ok::<(), cfdi_core::comprobante::VersionParseError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CfdiVersion {
    #[serde(rename = "3.3")]
    V33,
    #[serde(rename = "4.0")]
    V40,
}

/// Error returned when parsing a [`CfdiVersion`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    #[error("unsupported CFDI version: {input}")]
    Unsupported { input: String },
}

impl FromStr for CfdiVersion {
    type Err = VersionParseError;
    fn from_str(s: &str) -> Result<CfdiVersion, VersionParseError> {
        match s.trim() {
            "3.3" => Ok(CfdiVersion::V33),
            "4.0" => Ok(CfdiVersion::V40),
            other => Err(VersionParseError::Unsupported {
                input: other.to_string(),
            }),
        }
    }
}

impl CfdiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            CfdiVersion::V33 => "3.3",
            CfdiVersion::V40 => "4.0",
        }
    }

    pub fn namespace(&self) -> &'static str {
        match self {
            CfdiVersion::V33 => "http://www.sat.gob.mx/cfd/3",
            CfdiVersion::V40 => "http://www.sat.gob.mx/cfd/4",
        }
    }

    pub fn schema_location(&self) -> &'static str {
        match self {
            CfdiVersion::V33 => {
                "http://www.sat.gob.mx/cfd/3 http://www.sat.gob.mx/sitio_internet/cfd/3/cfdv33.xsd"
            }
            CfdiVersion::V40 => {
                "http://www.sat.gob.mx/cfd/4 http://www.sat.gob.mx/sitio_internet/cfd/4/cfdv40.xsd"
            }
        }
    }
}

impl fmt::Display for CfdiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issuer of the comprobante.
///
/// `nombre` is optional in 3.3 and required in 4.0; the 4.0 requirement is
/// enforced at parse time, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emisor {
    pub rfc: String,
    pub nombre: Option<String>,
    pub regimen_fiscal: String,
    pub fac_atr_adquirente: Option<String>,
}

impl Emisor {
    pub fn new(rfc: impl Into<String>, regimen_fiscal: impl Into<String>) -> Self {
        Self {
            rfc: rfc.into(),
            nombre: None,
            regimen_fiscal: regimen_fiscal.into(),
            fac_atr_adquirente: None,
        }
    }

    pub fn nombre(mut self, nombre: impl Into<String>) -> Self {
        self.nombre = Some(nombre.into());
        self
    }
}

/// Recipient of the comprobante.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receptor {
    pub rfc: String,
    pub nombre: Option<String>,
    pub domicilio_fiscal_receptor: Option<String>,
    pub residencia_fiscal: Option<String>,
    pub num_reg_id_trib: Option<String>,
    pub regimen_fiscal_receptor: Option<String>,
    pub uso_cfdi: String,
}

impl Receptor {
    pub fn new(rfc: impl Into<String>, uso_cfdi: impl Into<String>) -> Self {
        Self {
            rfc: rfc.into(),
            nombre: None,
            domicilio_fiscal_receptor: None,
            residencia_fiscal: None,
            num_reg_id_trib: None,
            regimen_fiscal_receptor: None,
            uso_cfdi: uso_cfdi.into(),
        }
    }

    pub fn nombre(mut self, nombre: impl Into<String>) -> Self {
        self.nombre = Some(nombre.into());
        self
    }

    pub fn domicilio_fiscal(mut self, cp: impl Into<String>) -> Self {
        self.domicilio_fiscal_receptor = Some(cp.into());
        self
    }

    pub fn regimen_fiscal(mut self, regimen: impl Into<String>) -> Self {
        self.regimen_fiscal_receptor = Some(regimen.into());
        self
    }
}

/// Tax shifted on a single concepto. Carries a `base`, unlike the
/// document-level [`TrasladoTotal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptoTraslado {
    pub base: String,
    pub impuesto: String,
    pub tipo_factor: String,
    pub tasa_o_cuota: Option<String>,
    pub importe: Option<String>,
}

/// Document-level tax total. Deliberately has no `base`; the canonical
/// format only reads it per concepto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrasladoTotal {
    pub impuesto: String,
    pub tipo_factor: String,
    pub tasa_o_cuota: Option<String>,
    pub importe: Option<String>,
}

/// Aggregate tax block of the comprobante.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Impuestos {
    pub traslados: Vec<TrasladoTotal>,
}

/// One invoice line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concepto {
    pub clave_prod_serv: String,
    pub no_identificacion: Option<String>,
    pub cantidad: String,
    pub clave_unidad: String,
    pub unidad: Option<String>,
    pub descripcion: String,
    pub valor_unitario: String,
    pub importe: String,
    pub descuento: Option<String>,
    pub objeto_imp: Option<String>,
    pub traslados: Vec<ConceptoTraslado>,
}

impl Concepto {
    pub fn new(
        clave_prod_serv: impl Into<String>,
        cantidad: impl Into<String>,
        clave_unidad: impl Into<String>,
        descripcion: impl Into<String>,
        valor_unitario: impl Into<String>,
        importe: impl Into<String>,
    ) -> Self {
        Self {
            clave_prod_serv: clave_prod_serv.into(),
            no_identificacion: None,
            cantidad: cantidad.into(),
            clave_unidad: clave_unidad.into(),
            unidad: None,
            descripcion: descripcion.into(),
            valor_unitario: valor_unitario.into(),
            importe: importe.into(),
            descuento: None,
            objeto_imp: None,
            traslados: Vec::new(),
        }
    }

    pub fn objeto_imp(mut self, objeto_imp: impl Into<String>) -> Self {
        self.objeto_imp = Some(objeto_imp.into());
        self
    }

    pub fn traslado(mut self, traslado: ConceptoTraslado) -> Self {
        self.traslados.push(traslado);
        self
    }
}

/// One signature-bearing attribute removed from a sealed comprobante,
/// reported so callers can keep an audit trail of the unseal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrippedAttribute {
    pub name: &'static str,
    pub value: String,
    pub length: usize,
}

/// In-memory CFDI document.
///
/// Business attributes are plain fields. The three signature-bearing
/// attributes (`NoCertificado`, `Certificado`, `Sello`) are kept private so
/// they can only be written as a unit and removed as a unit; an unsealed
/// document has them absent, never present-but-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comprobante {
    pub version: CfdiVersion,
    pub serie: Option<String>,
    pub folio: Option<String>,
    pub fecha: String,
    pub forma_pago: Option<String>,
    pub condiciones_de_pago: Option<String>,
    pub sub_total: String,
    pub descuento: Option<String>,
    pub moneda: String,
    pub tipo_cambio: Option<String>,
    pub total: String,
    pub tipo_de_comprobante: String,
    pub exportacion: Option<String>,
    pub metodo_pago: Option<String>,
    pub lugar_expedicion: String,
    pub confirmacion: Option<String>,
    pub emisor: Emisor,
    pub receptor: Receptor,
    pub conceptos: Vec<Concepto>,
    pub impuestos: Option<Impuestos>,
    no_certificado: Option<String>,
    certificado: Option<String>,
    sello: Option<String>,
}

impl Comprobante {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        version: CfdiVersion,
        fecha: impl Into<String>,
        sub_total: impl Into<String>,
        moneda: impl Into<String>,
        total: impl Into<String>,
        tipo_de_comprobante: impl Into<String>,
        lugar_expedicion: impl Into<String>,
        emisor: Emisor,
        receptor: Receptor,
        conceptos: Vec<Concepto>,
    ) -> Self {
        Self {
            version,
            serie: None,
            folio: None,
            fecha: fecha.into(),
            forma_pago: None,
            condiciones_de_pago: None,
            sub_total: sub_total.into(),
            descuento: None,
            moneda: moneda.into(),
            tipo_cambio: None,
            total: total.into(),
            tipo_de_comprobante: tipo_de_comprobante.into(),
            exportacion: None,
            metodo_pago: None,
            lugar_expedicion: lugar_expedicion.into(),
            confirmacion: None,
            emisor,
            receptor,
            conceptos,
            impuestos: None,
            no_certificado: None,
            certificado: None,
            sello: None,
        }
    }

    pub fn serie(mut self, serie: impl Into<String>) -> Self {
        self.serie = Some(serie.into());
        self
    }

    pub fn folio(mut self, folio: impl Into<String>) -> Self {
        self.folio = Some(folio.into());
        self
    }

    pub fn forma_pago(mut self, forma_pago: impl Into<String>) -> Self {
        self.forma_pago = Some(forma_pago.into());
        self
    }

    pub fn metodo_pago(mut self, metodo_pago: impl Into<String>) -> Self {
        self.metodo_pago = Some(metodo_pago.into());
        self
    }

    pub fn exportacion(mut self, exportacion: impl Into<String>) -> Self {
        self.exportacion = Some(exportacion.into());
        self
    }

    pub fn descuento(mut self, descuento: impl Into<String>) -> Self {
        self.descuento = Some(descuento.into());
        self
    }

    pub fn impuestos(mut self, impuestos: Impuestos) -> Self {
        self.impuestos = Some(impuestos);
        self
    }

    pub fn no_certificado(&self) -> Option<&str> {
        self.no_certificado.as_deref()
    }

    pub fn certificado(&self) -> Option<&str> {
        self.certificado.as_deref()
    }

    pub fn sello(&self) -> Option<&str> {
        self.sello.as_deref()
    }

    /// A comprobante is sealed only when all three signature attributes are
    /// present; there is no partially-signed state.
    pub fn esta_sellado(&self) -> bool {
        self.no_certificado.is_some() && self.certificado.is_some() && self.sello.is_some()
    }

    /// Writes the certificate serial and certificate body ahead of signing.
    /// The cadena original reads `NoCertificado`, so this must happen before
    /// it is derived.
    pub(crate) fn asignar_certificado(&mut self, no_certificado: &str, certificado: &str) {
        self.no_certificado = Some(no_certificado.to_string());
        self.certificado = Some(certificado.to_string());
    }

    /// Sets the three signature attributes as a unit, overwriting any prior
    /// values.
    pub fn aplicar_sello(
        &mut self,
        no_certificado: impl Into<String>,
        certificado: impl Into<String>,
        sello: impl Into<String>,
    ) {
        self.no_certificado = Some(no_certificado.into());
        self.certificado = Some(certificado.into());
        self.sello = Some(sello.into());
    }

    /// Removes the signature attributes if present. Idempotent; returns one
    /// entry per attribute actually removed, with its prior value and
    /// length, for the caller's audit trail.
    pub fn quitar_sello(&mut self) -> Vec<StrippedAttribute> {
        let mut stripped = Vec::new();
        for (name, slot) in [
            ("NoCertificado", &mut self.no_certificado),
            ("Certificado", &mut self.certificado),
            ("Sello", &mut self.sello),
        ] {
            if let Some(value) = slot.take() {
                stripped.push(StrippedAttribute {
                    name,
                    length: value.len(),
                    value,
                });
            }
        }
        stripped
    }
}
