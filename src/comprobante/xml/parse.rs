//! XML parsing for comprobantes.
//!
//! A single streaming pass over the document. Namespace prefixes are
//! ignored (matching is on local names), which accepts the usual `cfdi:`
//! prefix as well as documents bound to a default namespace. `Impuestos`
//! appears both inside a `Concepto` and at document level; containment
//! decides which one an event belongs to.
use crate::comprobante::{
    CfdiVersion, Comprobante, Concepto, ConceptoTraslado, Emisor, Impuestos, Receptor,
    TrasladoTotal,
};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors emitted while parsing XML comprobantes.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("XML parse error: {0}")]
    XmlParse(String),
    #[error("Missing required element: {0}")]
    MissingElement(&'static str),
    #[error("Missing required attribute: {0}")]
    MissingField(&'static str),
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Parse a comprobante from an XML string.
///
/// A document carrying signature attributes must carry all three
/// (`NoCertificado`, `Certificado`, `Sello`); a partial set is rejected.
///
/// # Examples
/// ```rust,no_run
/// use cfdi_core::comprobante::xml::parse::parse_comprobante;
///
/// let xml = std::fs::read_to_string("factura.xml")?;
/// let comprobante = parse_comprobante(&xml)?;
/// # let _ = comprobante;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn parse_comprobante(xml: &str) -> Result<Comprobante, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root: Option<RootAttrs> = None;
    let mut emisor: Option<Emisor> = None;
    let mut receptor: Option<Receptor> = None;
    let mut conceptos: Vec<Concepto> = Vec::new();
    let mut current_concepto: Option<Concepto> = None;
    let mut impuestos: Option<Impuestos> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ParseError::XmlParse(e.to_string()))?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"Comprobante" => root = Some(parse_root(e)?),
                    b"Emisor" => emisor = Some(parse_emisor(e)?),
                    b"Receptor" => receptor = Some(parse_receptor(e)?),
                    b"Concepto" => {
                        let concepto = parse_concepto(e)?;
                        if is_empty {
                            conceptos.push(concepto);
                        } else {
                            current_concepto = Some(concepto);
                        }
                    }
                    b"Impuestos" if current_concepto.is_none() => {
                        impuestos.get_or_insert_with(Impuestos::default);
                    }
                    b"Traslado" => {
                        if let Some(concepto) = current_concepto.as_mut() {
                            concepto.traslados.push(parse_concepto_traslado(e)?);
                        } else if let Some(impuestos) = impuestos.as_mut() {
                            impuestos.traslados.push(parse_traslado_total(e)?);
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => {
                if e.local_name().as_ref() == b"Concepto" {
                    if let Some(concepto) = current_concepto.take() {
                        conceptos.push(concepto);
                    }
                }
            }
            _ => {}
        }
    }

    let root = root.ok_or(ParseError::MissingElement("Comprobante"))?;
    let emisor = emisor.ok_or(ParseError::MissingElement("Emisor"))?;
    let receptor = receptor.ok_or(ParseError::MissingElement("Receptor"))?;
    if conceptos.is_empty() {
        return Err(ParseError::MissingElement("Conceptos"));
    }

    root.into_comprobante(emisor, receptor, conceptos, impuestos)
}

/// Parse a comprobante, checking the document's `Version` attribute
/// against the version the caller expects.
pub fn parse_comprobante_expecting(
    xml: &str,
    expected: CfdiVersion,
) -> Result<Comprobante, ParseError> {
    let comprobante = parse_comprobante(xml)?;
    if comprobante.version != expected {
        return Err(ParseError::InvalidValue {
            field: "Version",
            value: comprobante.version.as_str().to_string(),
        });
    }
    Ok(comprobante)
}

/// Parse a comprobante from an XML file.
pub fn parse_comprobante_file(path: &Path) -> Result<Comprobante, ParseError> {
    let xml = std::fs::read_to_string(path).map_err(|e| ParseError::XmlParse(e.to_string()))?;
    parse_comprobante(&xml)
}

/// Root attributes, held until the children have been seen.
struct RootAttrs {
    version: CfdiVersion,
    serie: Option<String>,
    folio: Option<String>,
    fecha: String,
    forma_pago: Option<String>,
    condiciones_de_pago: Option<String>,
    sub_total: String,
    descuento: Option<String>,
    moneda: String,
    tipo_cambio: Option<String>,
    total: String,
    tipo_de_comprobante: String,
    exportacion: Option<String>,
    metodo_pago: Option<String>,
    lugar_expedicion: String,
    confirmacion: Option<String>,
    no_certificado: Option<String>,
    certificado: Option<String>,
    sello: Option<String>,
}

impl RootAttrs {
    fn into_comprobante(
        self,
        emisor: Emisor,
        receptor: Receptor,
        conceptos: Vec<Concepto>,
        impuestos: Option<Impuestos>,
    ) -> Result<Comprobante, ParseError> {
        let mut comprobante = Comprobante::new(
            self.version,
            self.fecha,
            self.sub_total,
            self.moneda,
            self.total,
            self.tipo_de_comprobante,
            self.lugar_expedicion,
            emisor,
            receptor,
            conceptos,
        );
        comprobante.serie = self.serie;
        comprobante.folio = self.folio;
        comprobante.forma_pago = self.forma_pago;
        comprobante.condiciones_de_pago = self.condiciones_de_pago;
        comprobante.descuento = self.descuento;
        comprobante.tipo_cambio = self.tipo_cambio;
        comprobante.exportacion = self.exportacion;
        comprobante.metodo_pago = self.metodo_pago;
        comprobante.confirmacion = self.confirmacion;
        comprobante.impuestos = impuestos;

        match (self.no_certificado, self.certificado, self.sello) {
            (Some(no_certificado), Some(certificado), Some(sello)) => {
                comprobante.aplicar_sello(no_certificado, certificado, sello);
            }
            (None, None, None) => {}
            (no_certificado, certificado, _) => {
                // Partially-signed documents are malformed.
                let missing = if no_certificado.is_none() {
                    "NoCertificado"
                } else if certificado.is_none() {
                    "Certificado"
                } else {
                    "Sello"
                };
                return Err(ParseError::MissingField(missing));
            }
        }

        Ok(comprobante)
    }
}

fn parse_root(e: &BytesStart<'_>) -> Result<RootAttrs, ParseError> {
    let mut attrs = Attrs::collect(e)?;
    let version = attrs.required("Version")?;
    let version =
        CfdiVersion::from_str(&version).map_err(|_| ParseError::InvalidValue {
            field: "Version",
            value: version,
        })?;
    Ok(RootAttrs {
        version,
        serie: attrs.optional("Serie"),
        folio: attrs.optional("Folio"),
        fecha: attrs.required("Fecha")?,
        forma_pago: attrs.optional("FormaPago"),
        condiciones_de_pago: attrs.optional("CondicionesDePago"),
        sub_total: attrs.required("SubTotal")?,
        descuento: attrs.optional("Descuento"),
        moneda: attrs.required("Moneda")?,
        tipo_cambio: attrs.optional("TipoCambio"),
        total: attrs.required("Total")?,
        tipo_de_comprobante: attrs.required("TipoDeComprobante")?,
        exportacion: attrs.optional("Exportacion"),
        metodo_pago: attrs.optional("MetodoPago"),
        lugar_expedicion: attrs.required("LugarExpedicion")?,
        confirmacion: attrs.optional("Confirmacion"),
        no_certificado: attrs.optional("NoCertificado"),
        certificado: attrs.optional("Certificado"),
        sello: attrs.optional("Sello"),
    })
}

fn parse_emisor(e: &BytesStart<'_>) -> Result<Emisor, ParseError> {
    let mut attrs = Attrs::collect(e)?;
    let mut emisor = Emisor::new(attrs.required("Rfc")?, attrs.required("RegimenFiscal")?);
    emisor.nombre = attrs.optional("Nombre");
    emisor.fac_atr_adquirente = attrs.optional("FacAtrAdquirente");
    Ok(emisor)
}

fn parse_receptor(e: &BytesStart<'_>) -> Result<Receptor, ParseError> {
    let mut attrs = Attrs::collect(e)?;
    let mut receptor = Receptor::new(attrs.required("Rfc")?, attrs.required("UsoCFDI")?);
    receptor.nombre = attrs.optional("Nombre");
    receptor.domicilio_fiscal_receptor = attrs.optional("DomicilioFiscalReceptor");
    receptor.residencia_fiscal = attrs.optional("ResidenciaFiscal");
    receptor.num_reg_id_trib = attrs.optional("NumRegIdTrib");
    receptor.regimen_fiscal_receptor = attrs.optional("RegimenFiscalReceptor");
    Ok(receptor)
}

fn parse_concepto(e: &BytesStart<'_>) -> Result<Concepto, ParseError> {
    let mut attrs = Attrs::collect(e)?;
    let mut concepto = Concepto::new(
        attrs.required("ClaveProdServ")?,
        attrs.required("Cantidad")?,
        attrs.required("ClaveUnidad")?,
        attrs.required("Descripcion")?,
        attrs.required("ValorUnitario")?,
        attrs.required("Importe")?,
    );
    concepto.no_identificacion = attrs.optional("NoIdentificacion");
    concepto.unidad = attrs.optional("Unidad");
    concepto.descuento = attrs.optional("Descuento");
    concepto.objeto_imp = attrs.optional("ObjetoImp");
    Ok(concepto)
}

fn parse_concepto_traslado(e: &BytesStart<'_>) -> Result<ConceptoTraslado, ParseError> {
    let mut attrs = Attrs::collect(e)?;
    Ok(ConceptoTraslado {
        base: attrs.required("Base")?,
        impuesto: attrs.required("Impuesto")?,
        tipo_factor: attrs.required("TipoFactor")?,
        tasa_o_cuota: attrs.optional("TasaOCuota"),
        importe: attrs.optional("Importe"),
    })
}

fn parse_traslado_total(e: &BytesStart<'_>) -> Result<TrasladoTotal, ParseError> {
    let mut attrs = Attrs::collect(e)?;
    Ok(TrasladoTotal {
        impuesto: attrs.required("Impuesto")?,
        tipo_factor: attrs.required("TipoFactor")?,
        tasa_o_cuota: attrs.optional("TasaOCuota"),
        importe: attrs.optional("Importe"),
    })
}

/// Attribute map keyed by local name, with unescaped values.
struct Attrs {
    map: HashMap<String, String>,
}

impl Attrs {
    fn collect(e: &BytesStart<'_>) -> Result<Self, ParseError> {
        let mut map = HashMap::new();
        for attr in e.attributes() {
            let attr: Attribute<'_> = attr.map_err(|e| ParseError::XmlParse(e.to_string()))?;
            if attr.key.as_ref().starts_with(b"xmlns") {
                continue;
            }
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| ParseError::XmlParse(e.to_string()))?
                .into_owned();
            map.insert(key, value);
        }
        Ok(Self { map })
    }

    fn required(&mut self, name: &'static str) -> Result<String, ParseError> {
        self.map.remove(name).ok_or(ParseError::MissingField(name))
    }

    fn optional(&mut self, name: &str) -> Option<String> {
        self.map.remove(name)
    }
}
