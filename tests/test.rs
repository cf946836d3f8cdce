mod util;

use clustercert::bundle::{CA_CERT_KEY, CA_PRIVATE_KEY_KEY, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY, ToBundle};
use clustercert::bundle::{Bundle, BundleKind, ObjectKey};
use clustercert::ca::{CAKeyPair, RootOptions, parse_ca};
use clustercert::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, FlagSet,
    KeyUsage, KeyUsages, SubjectAltName, SubjectKeyIdentifier,
};
use clustercert::codec;
use clustercert::command::{GenerateParams, generate_user_certificate};
use clustercert::error::CertError;
use clustercert::issuer::{CertificateRole, IssueOptions};
use clustercert::key::{KeyAlgorithm, KeyPair};
use clustercert::store::{MemoryStore, SecretStore, StoreError};
use time::{Duration, OffsetDateTime};

pub type Result<T> = std::result::Result<T, CertError>;

/// A CA bundle survives parse and re-encode with identical certificate bytes
/// and a key that still signs for the same certificate.
#[test]
fn ca_bundle_roundtrip() -> Result<()> {
    let ca = util::generate_ca_cert();
    let bundle = util::ca_bundle(&ca);

    let parsed = parse_ca(&bundle)?;
    let reencoded = parsed.to_bundle(bundle.identity.clone());
    assert_eq!(reencoded.get(CA_CERT_KEY), bundle.get(CA_CERT_KEY));
    assert_eq!(reencoded.get(CA_PRIVATE_KEY_KEY), bundle.get(CA_PRIVATE_KEY_KEY));

    let reparsed = parse_ca(&reencoded)?;
    let leaf = reparsed.issue_pair("alice", CertificateRole::Client, &[])?;
    leaf.certificate().verify_signed_by(ca.certificate())?;
    Ok(())
}

#[test]
fn client_certificate_extensions() -> Result<()> {
    let ca = util::generate_ca_cert();
    let leaf = ca.issue_pair("alice", CertificateRole::Client, &[])?;
    let cert = leaf.certificate();

    cert.verify_signed_by(ca.certificate())?;
    assert_eq!(leaf.ca_certificate(), ca.certificate());
    assert_eq!(cert.common_name(), "alice");
    assert_eq!(cert.issuer(), ca.certificate().subject());

    let eku = cert.extension::<ExtendedKeyUsage>()?.unwrap();
    assert_eq!(eku.usage, vec![ExtendedKeyUsageOption::ClientAuth]);

    let key_usage = cert.extension::<KeyUsage>()?.unwrap();
    assert_eq!(key_usage.0, FlagSet::from(KeyUsages::DigitalSignature));
    assert!(cert.is_extension_critical::<KeyUsage>());

    let bc = cert.extension::<BasicConstraints>()?.unwrap();
    assert!(!bc.is_ca);
    assert!(cert.is_extension_critical::<BasicConstraints>());

    assert!(cert.extension::<SubjectAltName>()?.is_none());
    Ok(())
}

#[test]
fn server_certificate_includes_subject_in_alt_names() -> Result<()> {
    let ca = util::generate_ca_cert();
    let leaf = ca.issue_pair("cluster-example-rw", CertificateRole::Server, &[])?;
    let cert = leaf.certificate();

    cert.verify_signed_by(ca.certificate())?;
    let san = cert.extension::<SubjectAltName>()?.unwrap();
    assert!(san.names.contains(&"cluster-example-rw".to_string()));

    let eku = cert.extension::<ExtendedKeyUsage>()?.unwrap();
    assert_eq!(eku.usage, vec![ExtendedKeyUsageOption::ServerAuth]);

    let key_usage = cert.extension::<KeyUsage>()?.unwrap();
    assert!(key_usage.0.contains(KeyUsages::DigitalSignature));
    assert!(key_usage.0.contains(KeyUsages::KeyEncipherment));
    Ok(())
}

#[test]
fn server_certificate_with_explicit_alt_names() -> Result<()> {
    let ca = util::generate_ca_cert();
    let alt_names = vec![
        "cluster-example-rw.db.svc".to_string(),
        "10.0.0.7".to_string(),
        "::1".to_string(),
    ];
    let leaf = ca.issue_pair("cluster-example-rw", CertificateRole::Server, &alt_names)?;
    let san = leaf.certificate().extension::<SubjectAltName>()?.unwrap();
    assert_eq!(san.names, alt_names);
    Ok(())
}

#[test]
fn key_identifiers_chain_to_ca() -> Result<()> {
    let ca = util::generate_ca_cert();
    let leaf = ca.issue_pair("alice", CertificateRole::Client, &[])?;

    let ca_ski = ca.certificate().extension::<SubjectKeyIdentifier>()?.unwrap();
    let aki = leaf.certificate().extension::<AuthorityKeyIdentifier>()?.unwrap();
    assert_eq!(aki.key_identifier, ca_ski.0);

    let leaf_ski = leaf.certificate().extension::<SubjectKeyIdentifier>()?.unwrap();
    assert_ne!(leaf_ski.0, ca_ski.0);
    Ok(())
}

#[test]
fn leaf_never_outlives_ca() -> Result<()> {
    let ca = util::generate_ca_cert_with(&RootOptions::builder().validity(Duration::days(30)).build());
    let leaf = ca.issue_pair("alice", CertificateRole::Client, &[])?;
    assert!(leaf.certificate().not_after() <= ca.certificate().not_after());
    assert!(leaf.certificate().not_before() >= ca.certificate().not_before());
    Ok(())
}

#[test]
fn default_validity_is_backdated_and_short_lived() -> Result<()> {
    let ca = util::generate_ca_cert();
    let before = OffsetDateTime::now_utc();
    let leaf = ca.issue_pair("alice", CertificateRole::Client, &[])?;
    let cert = leaf.certificate();

    assert!(cert.not_before() < before);
    assert!(cert.not_before() >= before - Duration::minutes(6));
    assert!(cert.not_after() <= before + Duration::days(90) + Duration::minutes(1));
    assert!(cert.not_after() >= before + Duration::days(90) - Duration::minutes(1));
    assert!(cert.is_valid_at(OffsetDateTime::now_utc()));
    Ok(())
}

#[test]
fn validity_override() -> Result<()> {
    let ca = util::generate_ca_cert();
    let options = IssueOptions::builder().validity(Duration::days(1)).build();
    let leaf = ca.issue_pair_with("alice", CertificateRole::Client, &[], &options)?;
    assert!(leaf.certificate().not_after() <= OffsetDateTime::now_utc() + Duration::days(1));
    Ok(())
}

/// A lifetime past the end of the calendar still ends at the CA's `notAfter`.
#[test]
fn unbounded_validity_is_clamped_to_ca() -> Result<()> {
    let ca = util::generate_ca_cert();
    for validity in [Duration::MAX, Duration::days(365 * 20_000)] {
        let options = IssueOptions::builder()
            .validity(validity)
            .clock_skew(Duration::MAX)
            .build();
        let leaf = ca.issue_pair_with("alice", CertificateRole::Client, &[], &options)?;
        assert_eq!(leaf.certificate().not_after(), ca.certificate().not_after());
        assert_eq!(leaf.certificate().not_before(), ca.certificate().not_before());
        leaf.certificate().verify_signed_by(ca.certificate())?;
    }
    Ok(())
}

#[test]
fn unbounded_root_validity_is_rejected() {
    for options in [
        RootOptions::builder().validity(Duration::MAX).build(),
        RootOptions::builder()
            .validity(Duration::days(365 * 20_000))
            .build(),
        RootOptions::builder().clock_skew(Duration::MAX).build(),
    ] {
        let err = CAKeyPair::create_root(util::ca_subject(), &options).unwrap_err();
        assert!(matches!(err, CertError::InvalidInput(_)), "{err:?}");
    }
}

#[test]
fn serial_numbers_differ() -> Result<()> {
    let ca = util::generate_ca_cert();
    let first = ca.issue_pair("alice", CertificateRole::Client, &[])?;
    let second = ca.issue_pair("alice", CertificateRole::Client, &[])?;
    assert_ne!(
        first.certificate().serial_number(),
        second.certificate().serial_number()
    );
    assert_ne!(
        first.private_key().public_key(),
        second.private_key().public_key()
    );
    Ok(())
}

#[test]
fn expired_ca_is_rejected() {
    // notAfter lands one second before the call.
    let options = RootOptions::builder()
        .valid_from(OffsetDateTime::now_utc() - Duration::days(1))
        .validity(Duration::days(1) - Duration::seconds(1))
        .build();
    let ca = util::generate_ca_cert_with(&options);

    let err = parse_ca(&util::ca_bundle(&ca)).unwrap_err();
    assert!(matches!(err, CertError::ExpiredCa(_)), "{err:?}");

    let err = ca
        .issue_pair("alice", CertificateRole::Client, &[])
        .unwrap_err();
    assert!(matches!(err, CertError::ExpiredCa(_)), "{err:?}");
}

#[test]
fn not_yet_valid_ca_is_rejected() {
    let options = RootOptions::builder()
        .valid_from(OffsetDateTime::now_utc() + Duration::days(1))
        .build();
    let ca = util::generate_ca_cert_with(&options);
    assert!(matches!(
        parse_ca(&util::ca_bundle(&ca)),
        Err(CertError::ExpiredCa(_))
    ));
}

#[test]
fn swapped_private_key_is_rejected() {
    let ca = util::generate_ca_cert();
    let other = KeyPair::generate_ecdsa_p256().unwrap();
    let bundle = util::ca_bundle(&ca).with_field(CA_PRIVATE_KEY_KEY, codec::encode_private_key(&other));

    assert_eq!(
        parse_ca(&bundle).unwrap_err(),
        CertError::KeyCertificateMismatch
    );
    assert_eq!(
        CAKeyPair::new(ca.certificate().clone(), other).unwrap_err(),
        CertError::KeyCertificateMismatch
    );
}

#[test]
fn missing_fields_are_reported() {
    let ca = util::generate_ca_cert();
    let full = util::ca_bundle(&ca);

    let mut without_key = full.clone();
    without_key.data.remove(CA_PRIVATE_KEY_KEY);
    assert_eq!(
        parse_ca(&without_key).unwrap_err(),
        CertError::MissingField(CA_PRIVATE_KEY_KEY.to_string())
    );

    let mut without_cert = full;
    without_cert.data.remove(CA_CERT_KEY);
    assert_eq!(
        parse_ca(&without_cert).unwrap_err(),
        CertError::MissingField(CA_CERT_KEY.to_string())
    );
}

#[test]
fn malformed_fields_are_reported() {
    let ca = util::generate_ca_cert();
    let bundle = util::ca_bundle(&ca).with_field(CA_CERT_KEY, b"not a certificate".to_vec());
    assert!(matches!(
        parse_ca(&bundle),
        Err(CertError::MalformedEncoding(_))
    ));
}

#[test]
fn invalid_subjects_are_rejected() {
    let ca = util::generate_ca_cert();
    for subject in ["", "   "] {
        let err = ca
            .issue_pair(subject, CertificateRole::Client, &[])
            .unwrap_err();
        assert!(matches!(err, CertError::InvalidSubject(_)), "{err:?}");
    }

    let err = ca
        .issue_pair("bücher.example", CertificateRole::Server, &[])
        .unwrap_err();
    assert!(matches!(err, CertError::InvalidSubject(_)), "{err:?}");
}

#[test]
fn leaf_key_matches_ca_strength() -> Result<()> {
    let ca = util::generate_ca_cert_with(
        &RootOptions::builder()
            .key_algorithm(KeyAlgorithm::EcdsaP384)
            .build(),
    );
    let leaf = ca.issue_pair("alice", CertificateRole::Client, &[])?;
    assert_eq!(leaf.private_key().algorithm(), KeyAlgorithm::EcdsaP384);
    leaf.certificate().verify_signed_by(ca.certificate())?;

    let weaker = IssueOptions::builder()
        .key_algorithm(KeyAlgorithm::EcdsaP256)
        .build();
    assert!(matches!(
        ca.issue_pair_with("alice", CertificateRole::Client, &[], &weaker),
        Err(CertError::InvalidInput(_))
    ));
    Ok(())
}

#[test]
fn ed25519_leaf_under_ecdsa_ca() -> Result<()> {
    let ca = util::generate_ca_cert();
    let options = IssueOptions::builder()
        .key_algorithm(KeyAlgorithm::Ed25519)
        .build();
    let leaf = ca.issue_pair_with("alice", CertificateRole::Client, &[], &options)?;
    assert_eq!(leaf.private_key().algorithm(), KeyAlgorithm::Ed25519);
    leaf.certificate().verify_signed_by(ca.certificate())?;
    Ok(())
}

#[test]
fn ed25519_ca() -> Result<()> {
    let ca = util::generate_ca_cert_with(
        &RootOptions::builder()
            .key_algorithm(KeyAlgorithm::Ed25519)
            .build(),
    );
    let leaf = ca.issue_pair("server.local", CertificateRole::Server, &[])?;
    leaf.certificate().verify_signed_by(ca.certificate())?;
    parse_ca(&util::ca_bundle(&ca))?;
    Ok(())
}

#[test]
fn leaf_signed_by_other_ca_does_not_verify() -> Result<()> {
    let ca = util::generate_ca_cert();
    let other = util::generate_ca_cert();
    let leaf = ca.issue_pair("alice", CertificateRole::Client, &[])?;
    assert!(matches!(
        leaf.certificate().verify_signed_by(other.certificate()),
        Err(CertError::VerificationFailure(_))
    ));
    Ok(())
}

#[test]
fn leaf_bundle_decodes() -> Result<()> {
    let ca = util::generate_ca_cert();
    let leaf = ca.issue_pair("alice", CertificateRole::Client, &[])?;
    let bundle = leaf.to_bundle(ObjectKey::new(util::NAMESPACE, "alice-cert"));

    assert_eq!(bundle.kind, BundleKind::Tls);
    let cert = codec::decode_certificate(bundle.require(TLS_CERT_KEY)?)?;
    let key = codec::decode_private_key(bundle.require(TLS_PRIVATE_KEY_KEY)?)?;
    assert_eq!(&cert, leaf.certificate());
    assert_eq!(key.public_key(), cert.public_key()?);
    Ok(())
}

/// The full user certificate flow against a stored cluster CA.
#[test]
fn generate_user_certificate_flow() -> Result<()> {
    let ca = util::generate_ca_cert();
    let store = MemoryStore::new();
    store.insert(util::ca_bundle(&ca));

    let params = GenerateParams::builder()
        .name("alice-cert")
        .namespace(util::NAMESPACE)
        .user("alice")
        .cluster_name(util::CLUSTER)
        .build();

    let preview = generate_user_certificate(&store, &params, &IssueOptions::default(), true)?;
    assert!(matches!(
        store.get(&params.user_secret()),
        Err(StoreError::NotFound(_))
    ));

    let created = generate_user_certificate(&store, &params, &IssueOptions::default(), false)?;
    assert_ne!(preview, created);
    let stored: Bundle = store.get(&params.user_secret())?;
    assert_eq!(stored, created);

    let cert = codec::decode_certificate(stored.require(TLS_CERT_KEY)?)?;
    assert_eq!(cert.common_name(), "alice");
    cert.verify_signed_by(ca.certificate())?;

    let again = generate_user_certificate(&store, &params, &IssueOptions::default(), false);
    assert!(matches!(
        again,
        Err(CertError::Store(StoreError::AlreadyExists(_)))
    ));
    Ok(())
}

#[test]
#[ignore = "RSA key generation is slow in debug builds"]
fn rsa_ca_and_leaf() -> Result<()> {
    let ca = util::generate_ca_cert_with(
        &RootOptions::builder()
            .key_algorithm(KeyAlgorithm::Rsa { bits: 2048 })
            .build(),
    );
    let leaf = ca.issue_pair("alice", CertificateRole::Client, &[])?;
    assert_eq!(leaf.private_key().algorithm(), KeyAlgorithm::Rsa { bits: 2048 });
    leaf.certificate().verify_signed_by(ca.certificate())?;
    parse_ca(&util::ca_bundle(&ca))?;
    Ok(())
}
