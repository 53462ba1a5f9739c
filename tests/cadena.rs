mod common;

use cfdi_core::comprobante::cadena::{cadena_original, CadenaError};

#[test]
fn cadena_is_deterministic() {
    let comprobante = common::dummy_comprobante_40();
    let first = cadena_original(&comprobante).expect("cadena");
    let second = cadena_original(&comprobante).expect("cadena");
    assert_eq!(first, second);
}

#[test]
fn cadena_has_the_canonical_frame() {
    let cadena = cadena_original(&common::dummy_comprobante_40()).expect("cadena");
    assert!(cadena.starts_with("||4.0|"), "got: {cadena}");
    assert!(cadena.ends_with("||"), "got: {cadena}");
}

#[test]
fn concepto_tokens_appear_in_stylesheet_order() {
    let cadena = cadena_original(&common::dummy_comprobante_40()).expect("cadena");
    assert!(
        cadena.contains("|01010101|1|H87|Test|100.00|100.00|02|"),
        "got: {cadena}"
    );
}

#[test]
fn unsigned_document_emits_an_empty_no_certificado_token() {
    let mut comprobante = common::dummy_comprobante_40();
    comprobante.forma_pago = None;
    let cadena = cadena_original(&comprobante).expect("cadena");
    // Fecha, then the empty required NoCertificado token, then SubTotal.
    assert!(
        cadena.contains("|2024-05-01T12:00:00||100.00|"),
        "got: {cadena}"
    );
}

#[test]
fn absent_optional_emits_nothing_but_empty_emits_a_token() {
    let mut absent = common::dummy_comprobante_40();
    absent.condiciones_de_pago = None;
    let mut empty = common::dummy_comprobante_40();
    empty.condiciones_de_pago = Some(String::new());

    let cadena_absent = cadena_original(&absent).expect("cadena");
    let cadena_empty = cadena_original(&empty).expect("cadena");
    assert_eq!(cadena_empty.len(), cadena_absent.len() + 1);
}

#[test]
fn values_are_normalized_before_emission() {
    let mut comprobante = common::dummy_comprobante_40();
    comprobante.conceptos[0].descripcion = "  Articulo \t de   prueba  ".into();
    let cadena = cadena_original(&comprobante).expect("cadena");
    assert!(cadena.contains("|Articulo de prueba|"), "got: {cadena}");
}

#[test]
fn version_33_has_no_exportacion_or_objeto_imp_tokens() {
    let mut comprobante = common::dummy_comprobante_33();
    // Foreign attributes on a 3.3 document must not leak into its cadena.
    comprobante.exportacion = Some("EXPORT-SENTINEL".into());
    comprobante.conceptos[0].objeto_imp = Some("OBJETO-SENTINEL".into());

    let cadena = cadena_original(&comprobante).expect("cadena");
    assert!(cadena.starts_with("||3.3|"), "got: {cadena}");
    assert!(!cadena.contains("EXPORT-SENTINEL"));
    assert!(!cadena.contains("OBJETO-SENTINEL"));
}

#[test]
fn document_level_traslados_close_the_cadena_without_a_base() {
    let cadena = cadena_original(&common::dummy_comprobante_40()).expect("cadena");
    assert!(
        cadena.ends_with("|002|Tasa|0.160000|16.00||"),
        "got: {cadena}"
    );
}

#[test]
fn rejects_a_document_without_conceptos() {
    let mut comprobante = common::dummy_comprobante_40();
    comprobante.conceptos.clear();
    let err = cadena_original(&comprobante).unwrap_err();
    assert!(matches!(err, CadenaError::Malformed { .. }));
}
