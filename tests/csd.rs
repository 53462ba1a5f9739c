mod common;

use base64ct::{Base64, Encoding};
use cfdi_core::csd::{Csd, CsdError};
use chrono::{Datelike, Utc};

#[test]
fn loads_certificate_metadata() {
    let csd = common::csd_test();
    assert_eq!(csd.serial_number(), "30001000000400002434");
    assert_eq!(csd.rfc(), "EKU9003173C9");
    assert!(csd.legal_name().contains("ESCUELA KEMPER URGATE"));
    assert_eq!(csd.valid_from().year(), 2024);
    assert_eq!(csd.valid_to().year(), 2034);
    assert!(!csd.is_expired_at(Utc::now()));
}

#[test]
fn accepts_base64_with_embedded_whitespace() {
    let cer = Base64::encode_string(&common::fixture_bytes("certs/csd-test.cer"));
    let key = Base64::encode_string(&common::fixture_bytes("certs/csd-test.key"));
    // PEM-style wrapping every 64 chars.
    let wrapped: String = cer
        .as_bytes()
        .chunks(64)
        .map(|chunk| std::str::from_utf8(chunk).unwrap())
        .collect::<Vec<_>>()
        .join("\n");

    let csd = Csd::from_base64(&wrapped, &key, common::CSD_PASSWORD).expect("load csd");
    assert_eq!(csd.rfc(), "EKU9003173C9");
}

#[test]
fn rejects_a_wrong_password() {
    let err = Csd::from_der(
        &common::fixture_bytes("certs/csd-test.cer"),
        &common::fixture_bytes("certs/csd-test.key"),
        "not-the-password",
    )
    .unwrap_err();
    assert!(matches!(err, CsdError::InvalidPrivateKey { .. }), "got: {err}");
}

#[test]
fn rejects_garbage_certificate_bytes() {
    let err = Csd::from_der(
        b"not a certificate",
        &common::fixture_bytes("certs/csd-test.key"),
        common::CSD_PASSWORD,
    )
    .unwrap_err();
    assert!(matches!(err, CsdError::InvalidCertificate { .. }), "got: {err}");
}

#[test]
fn rejects_a_key_that_does_not_match_the_certificate() {
    let err = Csd::from_der(
        &common::fixture_bytes("certs/csd-test.cer"),
        &common::fixture_bytes("certs/csd-other.key"),
        common::CSD_PASSWORD,
    )
    .unwrap_err();
    assert!(matches!(err, CsdError::KeyMismatch), "got: {err}");
}

#[test]
fn expired_certificate_loads_and_signs() {
    let csd = common::csd_expired();
    assert_eq!(csd.rfc(), "XIA190128J61");
    assert_eq!(csd.serial_number(), "30001000000400002333");
    assert!(csd.is_expired_at(Utc::now()));

    let signature = csd.sign(b"mensaje").expect("sign with expired csd");
    assert!(csd.verify(b"mensaje", &signature));
}

#[test]
fn signing_is_deterministic() {
    let csd = common::csd_test();
    let first = csd.sign(b"cadena original").expect("sign");
    let second = csd.sign(b"cadena original").expect("sign");
    assert_eq!(first, second);
}

#[test]
fn verify_rejects_an_altered_message() {
    let csd = common::csd_test();
    let signature = csd.sign(b"cadena original").expect("sign");
    assert!(csd.verify(b"cadena original", &signature));
    assert!(!csd.verify(b"cadena alterada", &signature));
    assert!(!csd.verify(b"cadena original", b"not a signature"));
}

#[test]
fn csd_supports_debug_formatting() {
    let csd = common::csd_test();
    let rendered = format!("{csd:?}");
    assert!(rendered.contains("Csd"));
}

#[test]
fn certificate_base64_round_trips_the_der() {
    let csd = common::csd_test();
    let decoded = Base64::decode_vec(&csd.certificate_base64()).expect("decode");
    assert_eq!(decoded, csd.certificate_der());
}
