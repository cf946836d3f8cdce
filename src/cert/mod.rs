pub mod extensions;
pub mod params;

use der::{Decode, Encode};
use extensions::ToAndFromX509Extension;
use time::OffsetDateTime;
use x509_cert::Certificate as X509Certificate;
use x509_cert::name::Name;

use crate::codec;
use crate::error::{CertError, Result};
use crate::key::PublicKey;

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRsa,
    /// SHA-256 with ECDSA.
    Sha256WithEcdsa,
    /// SHA-384 with ECDSA.
    Sha384WithEcdsa,
    /// EdDSA over Curve25519.
    Ed25519,
}

impl SignatureAlgorithm {
    pub fn oid(&self) -> const_oid::ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRsa => const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha256WithEcdsa => const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
            SignatureAlgorithm::Sha384WithEcdsa => const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
            SignatureAlgorithm::Ed25519 => const_oid::db::rfc8410::ID_ED_25519,
        }
    }
}

impl From<SignatureAlgorithm> for x509_cert::spki::AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA identifiers carry an explicit NULL parameter (RFC 4055); ECDSA and
    /// EdDSA identifiers carry none (RFC 5758, RFC 8410).
    fn from(value: SignatureAlgorithm) -> Self {
        let parameters = match value {
            SignatureAlgorithm::Sha256WithRsa => Some(der::Any::from(der::asn1::AnyRef::NULL)),
            _ => None,
        };
        x509_cert::spki::AlgorithmIdentifierOwned {
            oid: value.oid(),
            parameters,
        }
    }
}

/// Represents an X.509 certificate.
///
/// The DER encoding is kept alongside the parsed structure, so a certificate
/// read from a bundle is written back byte for byte.
#[derive(Debug, Clone)]
pub struct Certificate {
    inner: X509Certificate,
    der: Vec<u8>,
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl Certificate {
    /// Parses a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = X509Certificate::from_der(der)?;
        Ok(Self {
            inner,
            der: der.to_vec(),
        })
    }

    /// Parses the first `CERTIFICATE` block of a PEM stream.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        codec::decode_certificate(pem)
    }

    pub(crate) fn from_inner(inner: X509Certificate) -> Result<Self> {
        let der = inner
            .to_der()
            .map_err(|e| CertError::SigningFailure(format!("encoding signed certificate: {e}")))?;
        Ok(Self { inner, der })
    }

    /// The parsed certificate structure.
    pub fn inner(&self) -> &X509Certificate {
        &self.inner
    }

    /// The DER encoding of the certificate.
    pub fn to_der(&self) -> &[u8] {
        &self.der
    }

    /// Encodes the certificate into PEM format.
    ///
    /// # Returns
    /// A string containing the PEM-encoded certificate.
    pub fn to_pem(&self) -> String {
        codec::der_to_pem(&self.der, codec::CERTIFICATE_LABEL)
    }

    pub fn subject(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    /// The subject common name, or an empty string when the subject has none.
    pub fn common_name(&self) -> String {
        params::DistinguishedName::from_x509_name(self.subject()).common_name
    }

    /// The DER INTEGER content octets of the serial number.
    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    pub fn not_before(&self) -> OffsetDateTime {
        OffsetDateTime::from(
            self.inner
                .tbs_certificate
                .validity
                .not_before
                .to_system_time(),
        )
    }

    pub fn not_after(&self) -> OffsetDateTime {
        OffsetDateTime::from(self.inner.tbs_certificate.validity.not_after.to_system_time())
    }

    /// Whether `at` lies within `notBefore..=notAfter`.
    pub fn is_valid_at(&self, at: OffsetDateTime) -> bool {
        self.not_before() <= at && at <= self.not_after()
    }

    /// The subject public key embedded in the certificate.
    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    /// Looks up and decodes the extension of type `E`, if present.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .find(|ext| ext.extn_id == E::OID)
            .map(|ext| E::from_x509_extension_value(ext.extn_value.as_bytes()))
            .transpose()
    }

    /// Whether the extension of type `E` is present and marked critical.
    pub fn is_extension_critical<E: ToAndFromX509Extension>(&self) -> bool {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .any(|ext| ext.extn_id == E::OID && ext.critical)
    }

    /// Checks that this certificate names `issuer` as its issuer and carries a
    /// valid signature from the issuer's key.
    pub fn verify_signed_by(&self, issuer: &Certificate) -> Result<()> {
        if self.issuer() != issuer.subject() {
            return Err(CertError::VerificationFailure(
                "issuer name does not match the issuing certificate subject".to_string(),
            ));
        }
        let issuer_key = issuer.public_key()?;
        let expected = issuer_key.signature_algorithm().oid();
        if self.inner.signature_algorithm.oid != expected
            || self.inner.tbs_certificate.signature.oid != expected
        {
            return Err(CertError::VerificationFailure(format!(
                "signature algorithm {} does not match issuer key",
                self.inner.signature_algorithm.oid
            )));
        }
        let tbs = self.inner.tbs_certificate.to_der()?;
        let signature = self.inner.signature.raw_bytes();
        issuer_key.verify(&tbs, signature)
    }
}
