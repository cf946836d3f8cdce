use std::time::Duration;

use der::DateTime;
use der::asn1::{GeneralizedTime, OctetString, UtcTime};
use rand::RngCore;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Time;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{ExtensionParam, Validity};
use crate::error::{CertError, Result};

/// Random bytes drawn for every serial number.
pub const SERIAL_NUMBER_ENTROPY_BYTES: usize = 16;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `validity` - The certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key_info` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
pub struct TbsCertificate {
    /// Certificate serial number, as minimal positive DER INTEGER content
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    /// Copied verbatim from the issuing certificate's subject
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(|ext| {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        let serial_number = SerialNumber::new(self.serial_number.as_slice())?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: self.signature_algorithm.into(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key_info.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        })
    }
}

/// UTCTime up to 2049, GeneralizedTime afterwards (RFC 5280 4.1.2.5).
fn to_x509_time(at: time::OffsetDateTime) -> Result<Time> {
    let invalid = |e: der::Error| CertError::InvalidInput(format!("certificate time {at}: {e}"));
    let seconds = u64::try_from(at.unix_timestamp())
        .map_err(|_| CertError::InvalidInput(format!("certificate time {at} precedes 1970")))?;
    let date_time = DateTime::from_unix_duration(Duration::from_secs(seconds)).map_err(invalid)?;
    if date_time.year() < 2050 {
        Ok(Time::UtcTime(UtcTime::from_date_time(date_time).map_err(invalid)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

/// Draws a fresh serial number from the thread-local CSPRNG.
///
/// The result is the minimal two's-complement encoding of a positive integer
/// carrying [`SERIAL_NUMBER_ENTROPY_BYTES`] bytes of randomness.
pub fn random_serial_number() -> Vec<u8> {
    let mut random = [0u8; SERIAL_NUMBER_ENTROPY_BYTES];
    rand::rng().fill_bytes(&mut random);
    positive_integer_bytes(&random)
}

fn positive_integer_bytes(magnitude: &[u8]) -> Vec<u8> {
    let significant: Vec<u8> = magnitude.iter().copied().skip_while(|b| *b == 0).collect();
    match significant.first() {
        None => vec![1],
        Some(first) if first & 0x80 != 0 => {
            let mut bytes = Vec::with_capacity(significant.len() + 1);
            bytes.push(0);
            bytes.extend_from_slice(&significant);
            bytes
        }
        Some(_) => significant,
    }
}
