use cfdi_core::comprobante::{
    CfdiVersion, Comprobante, Concepto, ConceptoTraslado, Emisor, Impuestos, Receptor,
    TrasladoTotal,
};
use cfdi_core::csd::Csd;
use std::path::{Path, PathBuf};

pub const CSD_PASSWORD: &str = "12345678a";

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[allow(dead_code)]
pub fn fixture_bytes(name: &str) -> Vec<u8> {
    std::fs::read(fixture(name)).expect("read fixture")
}

/// CSD with a validity window well into the 2030s.
#[allow(dead_code)]
pub fn csd_test() -> Csd {
    Csd::from_der(
        &fixture_bytes("certs/csd-test.cer"),
        &fixture_bytes("certs/csd-test.key"),
        CSD_PASSWORD,
    )
    .expect("load test csd")
}

/// CSD whose certificate expired in 2021.
#[allow(dead_code)]
pub fn csd_expired() -> Csd {
    Csd::from_der(
        &fixture_bytes("certs/csd-expired.cer"),
        &fixture_bytes("certs/csd-expired.key"),
        CSD_PASSWORD,
    )
    .expect("load expired csd")
}

#[allow(dead_code)]
pub fn dummy_comprobante_40() -> Comprobante {
    Comprobante::new(
        CfdiVersion::V40,
        "2024-05-01T12:00:00",
        "100.00",
        "MXN",
        "116.00",
        "I",
        "45079",
        Emisor::new("EKU9003173C9", "601").nombre("ESCUELA KEMPER URGATE"),
        Receptor::new("XAXX010101000", "S01")
            .nombre("PUBLICO EN GENERAL")
            .domicilio_fiscal("45079")
            .regimen_fiscal("616"),
        vec![
            Concepto::new("01010101", "1", "H87", "Test", "100.00", "100.00")
                .objeto_imp("02")
                .traslado(ConceptoTraslado {
                    base: "100.00".into(),
                    impuesto: "002".into(),
                    tipo_factor: "Tasa".into(),
                    tasa_o_cuota: Some("0.160000".into()),
                    importe: Some("16.00".into()),
                }),
        ],
    )
    .exportacion("01")
    .metodo_pago("PUE")
    .forma_pago("01")
    .impuestos(Impuestos {
        traslados: vec![TrasladoTotal {
            impuesto: "002".into(),
            tipo_factor: "Tasa".into(),
            tasa_o_cuota: Some("0.160000".into()),
            importe: Some("16.00".into()),
        }],
    })
}

#[allow(dead_code)]
pub fn dummy_comprobante_33() -> Comprobante {
    Comprobante::new(
        CfdiVersion::V33,
        "2019-11-20T09:15:00",
        "250.00",
        "MXN",
        "290.00",
        "I",
        "06300",
        Emisor::new("XIA190128J61", "601").nombre("XENON INDUSTRIAL ARTICLES"),
        Receptor::new("XAXX010101000", "G03"),
        vec![
            Concepto::new(
                "50211503",
                "2",
                "H87",
                "Articulo industrial",
                "125.00",
                "250.00",
            )
            .traslado(ConceptoTraslado {
                base: "250.00".into(),
                impuesto: "002".into(),
                tipo_factor: "Tasa".into(),
                tasa_o_cuota: Some("0.160000".into()),
                importe: Some("40.00".into()),
            }),
        ],
    )
    .serie("B")
    .folio("1024")
    .metodo_pago("PUE")
    .impuestos(Impuestos {
        traslados: vec![TrasladoTotal {
            impuesto: "002".into(),
            tipo_factor: "Tasa".into(),
            tasa_o_cuota: Some("0.160000".into()),
            importe: Some("40.00".into()),
        }],
    })
}
