use bon::Builder;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use x509_cert::name::Name;

use crate::bundle::{Bundle, CA_CERT_KEY, CA_PRIVATE_KEY_KEY};
use crate::cert::Certificate;
use crate::cert::extensions::{KeyUsages, SubjectKeyIdentifier};
use crate::cert::params::{CertificationRequestInfo, DistinguishedName, Validity};
use crate::codec;
use crate::error::{CertError, Result};
use crate::issuer::{self, CertificateRole, DEFAULT_CLOCK_SKEW, IssueOptions, Issuer, LeafKeyPair};
use crate::key::{KeyAlgorithm, KeyPair};

/// Default lifetime of a self-signed root.
pub const DEFAULT_CA_VALIDITY: Duration = Duration::days(3650);

/// Key algorithm used for new roots unless overridden.
pub const DEFAULT_KEY_ALGORITHM: KeyAlgorithm = KeyAlgorithm::EcdsaP256;

/// Options for [`CAKeyPair::create_root`].
///
/// # Fields
/// * `validity` - Lifetime of the root, counted from `notBefore`.
/// * `clock_skew` - How far `notBefore` is backdated when `valid_from` is unset.
/// * `key_algorithm` - Algorithm of the CA key.
/// * `valid_from` - Explicit `notBefore`; overrides the backdated current time.
#[derive(Debug, Clone, Builder)]
pub struct RootOptions {
    #[builder(default = DEFAULT_CA_VALIDITY)]
    pub validity: Duration,
    #[builder(default = DEFAULT_CLOCK_SKEW)]
    pub clock_skew: Duration,
    #[builder(default = DEFAULT_KEY_ALGORITHM)]
    pub key_algorithm: KeyAlgorithm,
    pub valid_from: Option<OffsetDateTime>,
}

impl Default for RootOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A CA certificate together with the private key that signs on its behalf.
///
/// The key is always the pair of the certificate's public key; both
/// constructors enforce it.
#[derive(Debug)]
pub struct CAKeyPair {
    certificate: Certificate,
    private_key: KeyPair,
}

impl CAKeyPair {
    /// Pairs a certificate with its private key without looking at the clock.
    ///
    /// Fails with [`CertError::KeyCertificateMismatch`] when the key does not
    /// belong to the certificate.
    pub fn new(certificate: Certificate, private_key: KeyPair) -> Result<Self> {
        if private_key.public_key() != certificate.public_key()? {
            return Err(CertError::KeyCertificateMismatch);
        }
        Ok(Self {
            certificate,
            private_key,
        })
    }

    /// Assembles a CA from a bundle holding `ca.crt` and `ca.key`.
    ///
    /// See [`parse_ca`].
    pub fn from_bundle(bundle: &Bundle) -> Result<Self> {
        parse_ca(bundle)
    }

    /// Creates a self-signed root CA.
    pub fn create_root(subject: DistinguishedName, options: &RootOptions) -> Result<Self> {
        if options.validity <= Duration::ZERO || options.clock_skew < Duration::ZERO {
            return Err(CertError::InvalidInput(format!(
                "validity must be positive and clock skew non-negative (got {} and {})",
                options.validity, options.clock_skew
            )));
        }

        let not_before = match options.valid_from {
            Some(valid_from) => valid_from,
            None => OffsetDateTime::now_utc()
                .checked_sub(options.clock_skew)
                .ok_or_else(|| {
                    CertError::InvalidInput(format!(
                        "clock skew {} is out of range",
                        options.clock_skew
                    ))
                })?,
        };
        let validity = Validity::starting_at(not_before, options.validity)?;
        let name = subject.as_x509_name()?;
        let private_key = KeyPair::generate(options.key_algorithm)?;

        let cert_request = CertificationRequestInfo::builder()
            .subject(subject)
            .subject_public_key(private_key.public_key())
            .key_usage(KeyUsages::DigitalSignature.into())
            .is_ca(true)
            .build();

        let certificate = SelfIssuer {
            name,
            key: &private_key,
        }
        .issue(&cert_request, validity)?;

        debug!(
            subject = %certificate.common_name(),
            algorithm = %options.key_algorithm,
            not_after = %certificate.not_after(),
            "created root CA"
        );

        Ok(Self {
            certificate,
            private_key,
        })
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn private_key(&self) -> &KeyPair {
        &self.private_key
    }

    /// Issues a leaf for `subject_name` with the default [`IssueOptions`].
    pub fn issue_pair(
        &self,
        subject_name: &str,
        role: CertificateRole,
        alt_names: &[String],
    ) -> Result<LeafKeyPair> {
        issuer::issue(self, subject_name, role, alt_names, &IssueOptions::default())
    }

    /// Issues a leaf for `subject_name` with explicit options.
    pub fn issue_pair_with(
        &self,
        subject_name: &str,
        role: CertificateRole,
        alt_names: &[String],
        options: &IssueOptions,
    ) -> Result<LeafKeyPair> {
        issuer::issue(self, subject_name, role, alt_names, options)
    }
}

impl Issuer for CAKeyPair {
    fn issuer_name(&self) -> &Name {
        self.certificate.subject()
    }

    fn signing_key(&self) -> &KeyPair {
        &self.private_key
    }

    fn key_identifier(&self) -> Result<Vec<u8>> {
        match self.certificate.extension::<SubjectKeyIdentifier>()? {
            Some(ski) => Ok(ski.0),
            None => Ok(SubjectKeyIdentifier::from_spki(
                &self.certificate.inner().tbs_certificate.subject_public_key_info,
            )
            .0),
        }
    }
}

/// Signs a certificate with the key it certifies.
struct SelfIssuer<'a> {
    name: Name,
    key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> &Name {
        &self.name
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn key_identifier(&self) -> Result<Vec<u8>> {
        Ok(SubjectKeyIdentifier::from_spki(&self.key.as_spki()?).0)
    }
}

/// Validates and assembles a [`CAKeyPair`] from a bundle of named blobs.
///
/// Fails with [`CertError::MissingField`] when `ca.crt` or `ca.key` is
/// absent, [`CertError::MalformedEncoding`] when either does not decode,
/// [`CertError::KeyCertificateMismatch`] when the key does not belong to the
/// certificate and [`CertError::ExpiredCa`] when the current time lies outside
/// the certificate's validity window. The bundle is never modified.
pub fn parse_ca(bundle: &Bundle) -> Result<CAKeyPair> {
    parse_ca_at(bundle, OffsetDateTime::now_utc())
}

/// [`parse_ca`] evaluated at an explicit point in time.
pub fn parse_ca_at(bundle: &Bundle, at: OffsetDateTime) -> Result<CAKeyPair> {
    let certificate = codec::decode_certificate(bundle.require(CA_CERT_KEY)?)?;
    let private_key = codec::decode_private_key(bundle.require(CA_PRIVATE_KEY_KEY)?)?;
    let ca = CAKeyPair::new(certificate, private_key)?;

    if !ca.certificate.is_valid_at(at) {
        return Err(CertError::ExpiredCa(format!(
            "`{}` is valid from {} to {}, not at {at}",
            ca.certificate.common_name(),
            ca.certificate.not_before(),
            ca.certificate.not_after()
        )));
    }

    Ok(ca)
}
