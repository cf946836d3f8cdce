use std::fmt;
use std::str::FromStr;

use bon::Builder;
use der::Encode;
use der::flagset::FlagSet;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::ca::CAKeyPair;
use crate::cert::Certificate;
use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage,
    KeyUsages, SubjectAltName, SubjectKeyIdentifier, ToAndFromX509Extension,
};
use crate::cert::params::{CertificationRequestInfo, DistinguishedName, ExtensionParam, Validity};
use crate::error::{CertError, Result};
use crate::key::{KeyAlgorithm, KeyPair};
use crate::tbs_certificate::{TbsCertificate, random_serial_number};

/// Default lifetime of an issued leaf certificate.
pub const DEFAULT_LEAF_VALIDITY: Duration = Duration::days(90);

/// How far `notBefore` is backdated to tolerate clock drift between issuer and consumer.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::minutes(5);

/// The purpose a leaf certificate is issued for.
///
/// Each role fixes the key usage, extended key usage and subject alternative
/// names attached to the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateRole {
    /// TLS client authentication, e.g. a database user.
    Client,
    /// TLS server authentication.
    Server,
}

impl CertificateRole {
    pub fn key_usage(&self) -> FlagSet<KeyUsages> {
        match self {
            CertificateRole::Client => KeyUsages::DigitalSignature.into(),
            CertificateRole::Server => KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment,
        }
    }

    pub fn extended_key_usage(&self) -> Vec<ExtendedKeyUsageOption> {
        match self {
            CertificateRole::Client => vec![ExtendedKeyUsageOption::ClientAuth],
            CertificateRole::Server => vec![ExtendedKeyUsageOption::ServerAuth],
        }
    }

    /// Server certificates always carry at least one name: strict verifiers
    /// ignore the common name. Client certificates carry only what was asked for.
    pub fn subject_alt_names(&self, subject_name: &str, alt_names: &[String]) -> Vec<String> {
        match self {
            CertificateRole::Server if alt_names.is_empty() => vec![subject_name.to_string()],
            CertificateRole::Client | CertificateRole::Server => alt_names.to_vec(),
        }
    }
}

impl fmt::Display for CertificateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateRole::Client => f.write_str("client"),
            CertificateRole::Server => f.write_str("server"),
        }
    }
}

impl FromStr for CertificateRole {
    type Err = CertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "client" => Ok(CertificateRole::Client),
            "server" => Ok(CertificateRole::Server),
            other => Err(CertError::InvalidInput(format!(
                "unknown certificate role `{other}`"
            ))),
        }
    }
}

/// Tunables for a single issuance.
///
/// # Fields
/// * `validity` - Requested lifetime; clamped to the CA's own `notAfter`.
/// * `clock_skew` - How far `notBefore` is backdated.
/// * `key_algorithm` - Leaf key algorithm; defaults to the CA's algorithm and
///   may not be weaker than it.
#[derive(Debug, Clone, Builder)]
pub struct IssueOptions {
    #[builder(default = DEFAULT_LEAF_VALIDITY)]
    pub validity: Duration,
    #[builder(default = DEFAULT_CLOCK_SKEW)]
    pub clock_skew: Duration,
    pub key_algorithm: Option<KeyAlgorithm>,
}

impl Default for IssueOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A freshly issued certificate, its private key and the CA certificate that signed it.
#[derive(Debug)]
pub struct LeafKeyPair {
    certificate: Certificate,
    private_key: KeyPair,
    ca_certificate: Certificate,
}

impl LeafKeyPair {
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn private_key(&self) -> &KeyPair {
        &self.private_key
    }

    pub fn ca_certificate(&self) -> &Certificate {
        &self.ca_certificate
    }

    /// Gives up the pair as `(certificate, private_key, ca_certificate)`.
    pub fn into_parts(self) -> (Certificate, KeyPair, Certificate) {
        (self.certificate, self.private_key, self.ca_certificate)
    }
}

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the name placed in the issuer field of issued certificates.
    fn issuer_name(&self) -> &Name;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Returns the key identifier issued certificates reference in their
    /// authority key identifier.
    fn key_identifier(&self) -> Result<Vec<u8>>;

    /// Issues a certificate based on the provided certification request information.
    ///
    /// # Arguments
    /// * `cert_request` - The subject, public key and usages of the certificate to be issued.
    /// * `validity` - The exact validity window to encode.
    fn issue(
        &self,
        cert_request: &CertificationRequestInfo,
        validity: Validity,
    ) -> Result<Certificate> {
        if validity.not_after <= validity.not_before {
            return Err(CertError::InvalidInput(format!(
                "empty validity window {} .. {}",
                validity.not_before, validity.not_after
            )));
        }

        let signing_key = self.signing_key();
        let signature_algo = signing_key.signature_algorithm();
        let subject_public_key_info = cert_request.subject_public_key.to_spki()?;

        let basic_constraints = BasicConstraints {
            is_ca: cert_request.is_ca,
            max_path_length: None,
        };
        let mut extensions: Vec<ExtensionParam> = vec![
            ExtensionParam::from_extension(basic_constraints, true)?,
            ExtensionParam::from_extension(
                SubjectKeyIdentifier::from_spki(&subject_public_key_info),
                false,
            )?,
            ExtensionParam::from_extension(
                AuthorityKeyIdentifier {
                    key_identifier: self.key_identifier()?,
                },
                false,
            )?,
        ];

        let mut key_usage_flags = cert_request.key_usage;
        if cert_request.is_ca {
            key_usage_flags |= KeyUsages::KeyCertSign;
            key_usage_flags |= KeyUsages::CRLSign;
        }
        if !key_usage_flags.is_empty() {
            extensions.push(ExtensionParam::from_extension(
                KeyUsage(key_usage_flags),
                true,
            )?);
        }

        if !cert_request.usages.is_empty() {
            let extended_key_usage = ExtendedKeyUsage {
                usage: cert_request.usages.clone(),
            };
            extensions.push(ExtensionParam::from_extension(extended_key_usage, false)?);
        }

        if !cert_request.alt_names.is_empty() {
            let san = SubjectAltName {
                names: cert_request.alt_names.clone(),
            };
            extensions.push(ExtensionParam::from_extension(san, false)?);
        }

        let tbs_cert = TbsCertificate {
            serial_number: random_serial_number(),
            signature_algorithm: signature_algo,
            issuer: self.issuer_name().clone(),
            validity,
            subject: cert_request.subject.as_x509_name()?,
            subject_public_key_info,
            extensions,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let tbs_der = tbs_cert_inner
            .to_der()
            .map_err(|e| CertError::SigningFailure(format!("encoding TBS certificate: {e}")))?;
        let signature = signing_key.sign_data(&tbs_der)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algo.into(),
            signature: der::asn1::BitString::from_bytes(&signature)
                .map_err(|e| CertError::SigningFailure(e.to_string()))?,
        };

        Certificate::from_inner(cert_inner)
    }
}

/// Generates a key pair and signs a leaf certificate for `subject_name` under `ca`.
///
/// Fails with [`CertError::InvalidSubject`] for an empty subject or a name
/// that cannot be placed in a subject alternative name, with
/// [`CertError::ExpiredCa`] when the CA leaves no room for a validity window,
/// and propagates [`CertError::KeyGenerationFailure`] and
/// [`CertError::SigningFailure`] from the backends without retrying.
pub fn issue(
    ca: &CAKeyPair,
    subject_name: &str,
    role: CertificateRole,
    alt_names: &[String],
    options: &IssueOptions,
) -> Result<LeafKeyPair> {
    if subject_name.trim().is_empty() {
        return Err(CertError::InvalidSubject(
            "subject name must not be empty".to_string(),
        ));
    }
    if options.validity <= Duration::ZERO || options.clock_skew < Duration::ZERO {
        return Err(CertError::InvalidInput(format!(
            "validity must be positive and clock skew non-negative (got {} and {})",
            options.validity, options.clock_skew
        )));
    }

    let subject = DistinguishedName::builder()
        .common_name(subject_name.to_string())
        .build();
    let alt_names = role.subject_alt_names(subject_name, alt_names);
    // Reject names that cannot be encoded before spending time on key generation.
    SubjectAltName {
        names: alt_names.clone(),
    }
    .to_x509_extension_value()?;

    let ca_algorithm = ca.private_key().algorithm();
    let key_algorithm = options.key_algorithm.unwrap_or(ca_algorithm);
    if key_algorithm.security_bits() < ca_algorithm.security_bits() {
        return Err(CertError::InvalidInput(format!(
            "leaf key algorithm {key_algorithm} is weaker than the CA's {ca_algorithm}"
        )));
    }

    let now = OffsetDateTime::now_utc();
    let ca_validity = Validity {
        not_before: ca.certificate().not_before(),
        not_after: ca.certificate().not_after(),
    };
    // Out-of-range arithmetic falls back to the CA bounds, which the clamp keeps anyway.
    let requested_not_after = now.checked_add(options.validity);
    let requested = Validity {
        not_before: now
            .checked_sub(options.clock_skew)
            .unwrap_or(ca_validity.not_before),
        not_after: requested_not_after.unwrap_or(ca_validity.not_after),
    };
    let validity = requested.clamped_to(&ca_validity);
    if validity.not_after <= now || validity.not_after <= validity.not_before {
        return Err(CertError::ExpiredCa(format!(
            "CA expires at {}",
            ca_validity.not_after
        )));
    }
    if requested_not_after.is_none_or(|not_after| validity.not_after < not_after) {
        warn!(
            subject = subject_name,
            requested_validity = %options.validity,
            ca_not_after = %ca_validity.not_after,
            "leaf validity clamped to CA expiry"
        );
    }

    let private_key = KeyPair::generate(key_algorithm)?;

    let cert_request = CertificationRequestInfo::builder()
        .subject(subject)
        .subject_public_key(private_key.public_key())
        .key_usage(role.key_usage())
        .usages(role.extended_key_usage())
        .alt_names(alt_names)
        .build();

    let certificate = ca.issue(&cert_request, validity)?;

    debug!(
        subject = subject_name,
        role = %role,
        serial = %hex(certificate.serial_number()),
        not_after = %certificate.not_after(),
        "issued certificate"
    );

    Ok(LeafKeyPair {
        certificate,
        private_key,
        ca_certificate: ca.certificate().clone(),
    })
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
