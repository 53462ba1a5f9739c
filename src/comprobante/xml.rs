//! XML serialization for comprobantes.
//!
//! CFDI is attribute-heavy: every value lives in an XML attribute, child
//! elements only group them. The serializers below render through
//! `quick-xml`'s serde support, with one wrapper struct per element. The
//! three signature attributes are written only when present; an unsealed
//! document simply has no `Sello`, `NoCertificado` or `Certificado`.
use crate::comprobante::{
    Comprobante, Concepto, ConceptoTraslado, Emisor, Impuestos, Receptor, TrasladoTotal,
};
use quick_xml::se::{SeError, Serializer as QuickXmlSerializer};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

pub mod parse;

const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML serialization error.
#[derive(Debug, Error)]
pub enum XmlError {
    #[error("failed to serialize comprobante to XML: {source}")]
    Serialize {
        #[from]
        source: SeError,
    },
}

/// XML formatting options.
#[derive(Debug, Clone, Copy, Default)]
pub enum XmlFormat {
    #[default]
    Compact,
    Pretty {
        indent_char: char,
        indent_size: usize,
    },
}

impl Comprobante {
    /// Serializes the document, compact. The sealing pipeline calls this
    /// exactly once per seal.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use cfdi_core::comprobante::Comprobante;
    ///
    /// let comprobante: Comprobante = unimplemented!();
    /// let xml = comprobante.to_xml()?;
    /// assert!(xml.starts_with("<?xml"));
    /// # Ok::<(), cfdi_core::comprobante::xml::XmlError>(())
    /// ```
    pub fn to_xml(&self) -> Result<String, XmlError> {
        self.to_xml_with_format(XmlFormat::Compact)
    }

    pub fn to_xml_pretty(&self) -> Result<String, XmlError> {
        self.to_xml_with_format(XmlFormat::Pretty {
            indent_char: ' ',
            indent_size: 2,
        })
    }

    pub fn to_xml_with_format(&self, format: XmlFormat) -> Result<String, XmlError> {
        let mut buffer = String::with_capacity(4096);
        buffer.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        if matches!(format, XmlFormat::Pretty { .. }) {
            buffer.push('\n');
        }

        {
            let mut serializer = QuickXmlSerializer::new(&mut buffer);
            if let XmlFormat::Pretty {
                indent_char,
                indent_size,
            } = format
            {
                serializer.indent(indent_char, indent_size);
            }
            ComprobanteXml(self).serialize(serializer)?;
        }

        Ok(buffer)
    }
}

/// Wrapper for serializing a comprobante to XML.
struct ComprobanteXml<'a>(&'a Comprobante);

impl<'a> Serialize for ComprobanteXml<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let c = self.0;

        let mut root = serializer.serialize_struct("cfdi:Comprobante", 0)?;

        // ---- namespaces ----
        root.serialize_field("@xmlns:cfdi", c.version.namespace())?;
        root.serialize_field("@xmlns:xsi", XSI_NAMESPACE)?;
        root.serialize_field("@xsi:schemaLocation", c.version.schema_location())?;

        // ---- root attributes, in the order SAT's own samples use ----
        root.serialize_field("@Version", c.version.as_str())?;
        if let Some(serie) = &c.serie {
            root.serialize_field("@Serie", serie)?;
        }
        if let Some(folio) = &c.folio {
            root.serialize_field("@Folio", folio)?;
        }
        root.serialize_field("@Fecha", &c.fecha)?;
        if let Some(sello) = c.sello() {
            root.serialize_field("@Sello", sello)?;
        }
        if let Some(forma_pago) = &c.forma_pago {
            root.serialize_field("@FormaPago", forma_pago)?;
        }
        if let Some(no_certificado) = c.no_certificado() {
            root.serialize_field("@NoCertificado", no_certificado)?;
        }
        if let Some(certificado) = c.certificado() {
            root.serialize_field("@Certificado", certificado)?;
        }
        if let Some(condiciones) = &c.condiciones_de_pago {
            root.serialize_field("@CondicionesDePago", condiciones)?;
        }
        root.serialize_field("@SubTotal", &c.sub_total)?;
        if let Some(descuento) = &c.descuento {
            root.serialize_field("@Descuento", descuento)?;
        }
        root.serialize_field("@Moneda", &c.moneda)?;
        if let Some(tipo_cambio) = &c.tipo_cambio {
            root.serialize_field("@TipoCambio", tipo_cambio)?;
        }
        root.serialize_field("@Total", &c.total)?;
        root.serialize_field("@TipoDeComprobante", &c.tipo_de_comprobante)?;
        if let Some(exportacion) = &c.exportacion {
            root.serialize_field("@Exportacion", exportacion)?;
        }
        if let Some(metodo_pago) = &c.metodo_pago {
            root.serialize_field("@MetodoPago", metodo_pago)?;
        }
        root.serialize_field("@LugarExpedicion", &c.lugar_expedicion)?;
        if let Some(confirmacion) = &c.confirmacion {
            root.serialize_field("@Confirmacion", confirmacion)?;
        }

        // ---- children ----
        root.serialize_field("cfdi:Emisor", &EmisorXml(&c.emisor))?;
        root.serialize_field("cfdi:Receptor", &ReceptorXml(&c.receptor))?;
        root.serialize_field("cfdi:Conceptos", &ConceptosXml(&c.conceptos))?;
        if let Some(impuestos) = &c.impuestos {
            root.serialize_field("cfdi:Impuestos", &ImpuestosXml(impuestos))?;
        }

        root.end()
    }
}

struct EmisorXml<'a>(&'a Emisor);

impl<'a> Serialize for EmisorXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let e = self.0;
        let mut st = s.serialize_struct("cfdi:Emisor", 0)?;
        st.serialize_field("@Rfc", &e.rfc)?;
        if let Some(nombre) = &e.nombre {
            st.serialize_field("@Nombre", nombre)?;
        }
        st.serialize_field("@RegimenFiscal", &e.regimen_fiscal)?;
        if let Some(fac) = &e.fac_atr_adquirente {
            st.serialize_field("@FacAtrAdquirente", fac)?;
        }
        st.end()
    }
}

struct ReceptorXml<'a>(&'a Receptor);

impl<'a> Serialize for ReceptorXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let r = self.0;
        let mut st = s.serialize_struct("cfdi:Receptor", 0)?;
        st.serialize_field("@Rfc", &r.rfc)?;
        if let Some(nombre) = &r.nombre {
            st.serialize_field("@Nombre", nombre)?;
        }
        if let Some(cp) = &r.domicilio_fiscal_receptor {
            st.serialize_field("@DomicilioFiscalReceptor", cp)?;
        }
        if let Some(residencia) = &r.residencia_fiscal {
            st.serialize_field("@ResidenciaFiscal", residencia)?;
        }
        if let Some(num_reg) = &r.num_reg_id_trib {
            st.serialize_field("@NumRegIdTrib", num_reg)?;
        }
        if let Some(regimen) = &r.regimen_fiscal_receptor {
            st.serialize_field("@RegimenFiscalReceptor", regimen)?;
        }
        st.serialize_field("@UsoCFDI", &r.uso_cfdi)?;
        st.end()
    }
}

struct ConceptosXml<'a>(&'a [Concepto]);

impl<'a> Serialize for ConceptosXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cfdi:Conceptos", 0)?;
        for concepto in self.0 {
            st.serialize_field("cfdi:Concepto", &ConceptoXml(concepto))?;
        }
        st.end()
    }
}

struct ConceptoXml<'a>(&'a Concepto);

impl<'a> Serialize for ConceptoXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let c = self.0;
        let mut st = s.serialize_struct("cfdi:Concepto", 0)?;
        st.serialize_field("@ClaveProdServ", &c.clave_prod_serv)?;
        if let Some(no_id) = &c.no_identificacion {
            st.serialize_field("@NoIdentificacion", no_id)?;
        }
        st.serialize_field("@Cantidad", &c.cantidad)?;
        st.serialize_field("@ClaveUnidad", &c.clave_unidad)?;
        if let Some(unidad) = &c.unidad {
            st.serialize_field("@Unidad", unidad)?;
        }
        st.serialize_field("@Descripcion", &c.descripcion)?;
        st.serialize_field("@ValorUnitario", &c.valor_unitario)?;
        st.serialize_field("@Importe", &c.importe)?;
        if let Some(descuento) = &c.descuento {
            st.serialize_field("@Descuento", descuento)?;
        }
        if let Some(objeto_imp) = &c.objeto_imp {
            st.serialize_field("@ObjetoImp", objeto_imp)?;
        }
        if !c.traslados.is_empty() {
            st.serialize_field("cfdi:Impuestos", &ConceptoImpuestosXml(&c.traslados))?;
        }
        st.end()
    }
}

struct ConceptoImpuestosXml<'a>(&'a [ConceptoTraslado]);

impl<'a> Serialize for ConceptoImpuestosXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cfdi:Impuestos", 0)?;
        st.serialize_field("cfdi:Traslados", &ConceptoTrasladosXml(self.0))?;
        st.end()
    }
}

struct ConceptoTrasladosXml<'a>(&'a [ConceptoTraslado]);

impl<'a> Serialize for ConceptoTrasladosXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cfdi:Traslados", 0)?;
        for traslado in self.0 {
            st.serialize_field("cfdi:Traslado", &ConceptoTrasladoXml(traslado))?;
        }
        st.end()
    }
}

struct ConceptoTrasladoXml<'a>(&'a ConceptoTraslado);

impl<'a> Serialize for ConceptoTrasladoXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let t = self.0;
        let mut st = s.serialize_struct("cfdi:Traslado", 0)?;
        st.serialize_field("@Base", &t.base)?;
        st.serialize_field("@Impuesto", &t.impuesto)?;
        st.serialize_field("@TipoFactor", &t.tipo_factor)?;
        if let Some(tasa) = &t.tasa_o_cuota {
            st.serialize_field("@TasaOCuota", tasa)?;
        }
        if let Some(importe) = &t.importe {
            st.serialize_field("@Importe", importe)?;
        }
        st.end()
    }
}

// The model carries per-entry tax totals only, so no aggregate
// TotalImpuestosTrasladados attribute is written; inventing one here
// would put an unchecked fiscal amount into the output.
struct ImpuestosXml<'a>(&'a Impuestos);

impl<'a> Serialize for ImpuestosXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cfdi:Impuestos", 0)?;
        st.serialize_field("cfdi:Traslados", &TrasladosTotalesXml(&self.0.traslados))?;
        st.end()
    }
}

struct TrasladosTotalesXml<'a>(&'a [TrasladoTotal]);

impl<'a> Serialize for TrasladosTotalesXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = s.serialize_struct("cfdi:Traslados", 0)?;
        for traslado in self.0 {
            st.serialize_field("cfdi:Traslado", &TrasladoTotalXml(traslado))?;
        }
        st.end()
    }
}

// Document-level traslados carry no Base attribute.
struct TrasladoTotalXml<'a>(&'a TrasladoTotal);

impl<'a> Serialize for TrasladoTotalXml<'a> {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let t = self.0;
        let mut st = s.serialize_struct("cfdi:Traslado", 0)?;
        st.serialize_field("@Impuesto", &t.impuesto)?;
        st.serialize_field("@TipoFactor", &t.tipo_factor)?;
        if let Some(tasa) = &t.tasa_o_cuota {
            st.serialize_field("@TasaOCuota", tasa)?;
        }
        if let Some(importe) = &t.importe {
            st.serialize_field("@Importe", importe)?;
        }
        st.end()
    }
}

#[cfg(test)]
mod tests {
    use crate::comprobante::{
        CfdiVersion, Comprobante, Concepto, Emisor, Impuestos, Receptor, TrasladoTotal,
    };

    fn minimal() -> Comprobante {
        Comprobante::new(
            CfdiVersion::V40,
            "2024-05-01T12:00:00",
            "100.00",
            "MXN",
            "100.00",
            "I",
            "45079",
            Emisor::new("EKU9003173C9", "601").nombre("ESCUELA KEMPER URGATE"),
            Receptor::new("XAXX010101000", "S01")
                .nombre("PUBLICO EN GENERAL")
                .domicilio_fiscal("45079")
                .regimen_fiscal("616"),
            vec![
                Concepto::new("01010101", "1", "H87", "Test", "100.00", "100.00")
                    .objeto_imp("01"),
            ],
        )
        .exportacion("01")
    }

    #[test]
    fn serializes_namespaces_and_root_attributes() {
        let xml = minimal().to_xml().unwrap();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"xmlns:cfdi="http://www.sat.gob.mx/cfd/4""#));
        assert!(xml.contains(r#"Version="4.0""#));
        assert!(xml.contains(r#"<cfdi:Emisor Rfc="EKU9003173C9""#));
        assert!(xml.contains(r#"<cfdi:Concepto ClaveProdServ="01010101""#));
    }

    #[test]
    fn unsealed_document_has_no_signature_attributes() {
        let xml = minimal().to_xml().unwrap();
        assert!(!xml.contains("Sello="));
        assert!(!xml.contains("NoCertificado="));
        assert!(!xml.contains("Certificado="));
    }

    #[test]
    fn sealed_document_carries_all_three() {
        let mut c = minimal();
        c.aplicar_sello("30001000000400002434", "Q0VSVA==", "U0VMTE8=");
        let xml = c.to_xml().unwrap();
        assert!(xml.contains(r#"Sello="U0VMTE8=""#));
        assert!(xml.contains(r#"NoCertificado="30001000000400002434""#));
        assert!(xml.contains(r#"Certificado="Q0VSVA==""#));
    }

    #[test]
    fn document_taxes_carry_no_aggregate_total_attribute() {
        let mut c = minimal();
        c.impuestos = Some(Impuestos {
            traslados: vec![
                TrasladoTotal {
                    impuesto: "002".into(),
                    tipo_factor: "Tasa".into(),
                    tasa_o_cuota: Some("0.160000".into()),
                    importe: Some("16.00".into()),
                },
                TrasladoTotal {
                    impuesto: "003".into(),
                    tipo_factor: "Tasa".into(),
                    tasa_o_cuota: Some("0.080000".into()),
                    importe: Some("8.00".into()),
                },
            ],
        });
        let xml = c.to_xml().unwrap();
        assert!(!xml.contains("TotalImpuestosTrasladados"), "got: {xml}");
        assert!(xml.contains(r#"<cfdi:Traslado Impuesto="002""#));
        assert!(xml.contains(r#"<cfdi:Traslado Impuesto="003""#));
    }

    #[test]
    fn escapes_attribute_values() {
        let mut c = minimal();
        c.conceptos[0].descripcion = "Tubos 1\" & <2>".into();
        let xml = c.to_xml().unwrap();
        assert!(xml.contains("Tubos 1&quot; &amp; &lt;2&gt;"));
    }
}
