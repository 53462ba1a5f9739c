//! Cadena original derivation.
//!
//! The cadena original is the canonical pipe-delimited rendering of a
//! comprobante mandated by the SAT stylesheets (`cadenaoriginal_3_3.xslt`
//! and `cadenaoriginal_4_0.xslt`): `|` at the start, `||` at the end, and
//! one `|`-prefixed token per attribute in a fixed, version-specific order.
//! Required attributes always emit a token, even when their value is empty;
//! optional attributes emit nothing at all when absent. Values go through
//! `normalize-space` before emission.
//!
//! `Sello` and `Certificado` are never read; `NoCertificado` is, which is
//! why the signing pipeline writes the certificate serial onto the document
//! before deriving the cadena.
use crate::comprobante::{CfdiVersion, Comprobante, Concepto, Impuestos};
use thiserror::Error;

/// Errors emitted while deriving a cadena original.
#[derive(Debug, Error)]
pub enum CadenaError {
    #[error("malformed comprobante: {detail}")]
    Malformed { detail: String },
}

/// Derives the cadena original of a comprobante.
///
/// Pure function of the document's current state: calling it twice on an
/// unchanged comprobante yields byte-identical output.
///
/// # Errors
/// Returns [`CadenaError::Malformed`] when the document lacks the required
/// structure (no conceptos).
///
/// # Examples
/// ```rust,no_run
/// use cfdi_core::comprobante::cadena::cadena_original;
/// use cfdi_core::comprobante::Comprobante;
///
/// let comprobante: Comprobante = unimplemented!();
/// let cadena = cadena_original(&comprobante)?;
/// assert!(cadena.ends_with("||"));
/// # Ok::<(), cfdi_core::comprobante::cadena::CadenaError>(())
/// ```
pub fn cadena_original(comprobante: &Comprobante) -> Result<String, CadenaError> {
    if comprobante.conceptos.is_empty() {
        return Err(CadenaError::Malformed {
            detail: "comprobante has no Conceptos".into(),
        });
    }

    let mut tokens = Tokens::new();
    emit_comprobante(&mut tokens, comprobante);
    emit_emisor(&mut tokens, comprobante);
    emit_receptor(&mut tokens, comprobante);
    for concepto in &comprobante.conceptos {
        emit_concepto(&mut tokens, comprobante.version, concepto);
    }
    if let Some(impuestos) = &comprobante.impuestos {
        emit_impuestos(&mut tokens, impuestos);
    }
    Ok(tokens.finish())
}

/// Token accumulator mirroring the stylesheets' `Requerido`/`Opcional`
/// named templates.
struct Tokens {
    out: String,
}

impl Tokens {
    fn new() -> Self {
        Self {
            out: String::from("|"),
        }
    }

    /// Required token: always emitted, empty or not.
    fn requerido(&mut self, value: &str) {
        self.out.push('|');
        push_normalized(&mut self.out, value);
    }

    /// Optional token: absent attributes emit nothing, not even the pipe.
    fn opcional(&mut self, value: Option<&str>) {
        if let Some(value) = value {
            self.requerido(value);
        }
    }

    fn finish(mut self) -> String {
        self.out.push_str("||");
        self.out
    }
}

/// Equivalent of XPath `normalize-space`: whitespace runs collapse to a
/// single space, leading/trailing whitespace is dropped.
fn push_normalized(out: &mut String, value: &str) {
    let mut first = true;
    for word in value.split_whitespace() {
        if !first {
            out.push(' ');
        }
        out.push_str(word);
        first = false;
    }
}

fn emit_comprobante(tokens: &mut Tokens, c: &Comprobante) {
    tokens.requerido(c.version.as_str());
    tokens.opcional(c.serie.as_deref());
    tokens.opcional(c.folio.as_deref());
    tokens.requerido(&c.fecha);
    tokens.opcional(c.forma_pago.as_deref());
    tokens.requerido(c.no_certificado().unwrap_or_default());
    tokens.opcional(c.condiciones_de_pago.as_deref());
    tokens.requerido(&c.sub_total);
    tokens.opcional(c.descuento.as_deref());
    tokens.requerido(&c.moneda);
    tokens.opcional(c.tipo_cambio.as_deref());
    tokens.requerido(&c.total);
    tokens.requerido(&c.tipo_de_comprobante);
    if c.version == CfdiVersion::V40 {
        tokens.requerido(c.exportacion.as_deref().unwrap_or_default());
    }
    tokens.opcional(c.metodo_pago.as_deref());
    tokens.requerido(&c.lugar_expedicion);
    tokens.opcional(c.confirmacion.as_deref());
}

fn emit_emisor(tokens: &mut Tokens, c: &Comprobante) {
    let emisor = &c.emisor;
    tokens.requerido(&emisor.rfc);
    match c.version {
        CfdiVersion::V40 => tokens.requerido(emisor.nombre.as_deref().unwrap_or_default()),
        CfdiVersion::V33 => tokens.opcional(emisor.nombre.as_deref()),
    }
    tokens.requerido(&emisor.regimen_fiscal);
    if c.version == CfdiVersion::V40 {
        tokens.opcional(emisor.fac_atr_adquirente.as_deref());
    }
}

fn emit_receptor(tokens: &mut Tokens, c: &Comprobante) {
    let receptor = &c.receptor;
    tokens.requerido(&receptor.rfc);
    match c.version {
        CfdiVersion::V40 => {
            tokens.requerido(receptor.nombre.as_deref().unwrap_or_default());
            tokens.requerido(
                receptor
                    .domicilio_fiscal_receptor
                    .as_deref()
                    .unwrap_or_default(),
            );
        }
        CfdiVersion::V33 => tokens.opcional(receptor.nombre.as_deref()),
    }
    tokens.opcional(receptor.residencia_fiscal.as_deref());
    tokens.opcional(receptor.num_reg_id_trib.as_deref());
    if c.version == CfdiVersion::V40 {
        tokens.requerido(
            receptor
                .regimen_fiscal_receptor
                .as_deref()
                .unwrap_or_default(),
        );
    }
    tokens.requerido(&receptor.uso_cfdi);
}

fn emit_concepto(tokens: &mut Tokens, version: CfdiVersion, concepto: &Concepto) {
    tokens.requerido(&concepto.clave_prod_serv);
    tokens.opcional(concepto.no_identificacion.as_deref());
    tokens.requerido(&concepto.cantidad);
    tokens.requerido(&concepto.clave_unidad);
    tokens.opcional(concepto.unidad.as_deref());
    tokens.requerido(&concepto.descripcion);
    tokens.requerido(&concepto.valor_unitario);
    tokens.requerido(&concepto.importe);
    tokens.opcional(concepto.descuento.as_deref());
    if version == CfdiVersion::V40 {
        tokens.requerido(concepto.objeto_imp.as_deref().unwrap_or_default());
    }
    for traslado in &concepto.traslados {
        tokens.requerido(&traslado.base);
        tokens.requerido(&traslado.impuesto);
        tokens.requerido(&traslado.tipo_factor);
        tokens.opcional(traslado.tasa_o_cuota.as_deref());
        tokens.opcional(traslado.importe.as_deref());
    }
}

// Document-level traslados have no Base token; only per-concepto entries do.
fn emit_impuestos(tokens: &mut Tokens, impuestos: &Impuestos) {
    for traslado in &impuestos.traslados {
        tokens.requerido(&traslado.impuesto);
        tokens.requerido(&traslado.tipo_factor);
        tokens.opcional(traslado.tasa_o_cuota.as_deref());
        tokens.opcional(traslado.importe.as_deref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_space_collapses_and_trims() {
        let mut out = String::new();
        push_normalized(&mut out, "  ESCUELA \t KEMPER\n URGATE  ");
        assert_eq!(out, "ESCUELA KEMPER URGATE");
    }

    #[test]
    fn required_tokens_survive_empty_values() {
        let mut tokens = Tokens::new();
        tokens.requerido("a");
        tokens.requerido("");
        tokens.requerido("b");
        assert_eq!(tokens.finish(), "||a||b||");
    }

    #[test]
    fn optional_tokens_vanish_when_absent() {
        let mut tokens = Tokens::new();
        tokens.requerido("a");
        tokens.opcional(None);
        tokens.requerido("b");
        assert_eq!(tokens.finish(), "||a|b||");

        let mut tokens = Tokens::new();
        tokens.requerido("a");
        tokens.opcional(Some(""));
        tokens.requerido("b");
        assert_eq!(tokens.finish(), "||a||b||");
    }
}
