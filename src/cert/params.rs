use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::{PrintableStringRef, SetOfVec};
use der::{Any, Tag, Tagged};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
pub use crate::cert::extensions::ExtendedKeyUsageOption;
pub use crate::cert::extensions::KeyUsages;
use crate::error::{CertError, Result};
use crate::key::PublicKey;
use der::flagset::FlagSet;

const COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const STATE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const ORGANIZATION_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// Parameters for building an X.509 certificate.
///
/// # Fields
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `key_usage` - Key usage bits; the extension is omitted when empty.
/// * `usages` - A list of extended key usage options.
/// * `alt_names` - DNS names or IP addresses for the subject alternative name extension.
/// * `is_ca` - Indicates if the certificate is a CA.
#[derive(Clone, Debug, Builder)]
pub struct CertificationRequestInfo {
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    #[builder(default)]
    pub key_usage: FlagSet<KeyUsages>,
    #[builder(default)]
    pub usages: Vec<ExtendedKeyUsageOption>,
    #[builder(default)]
    pub alt_names: Vec<String>,
    #[builder(default)]
    pub is_ca: bool,
}

/// Distinguished name parameters for building an X.509 certificate.
///
/// This struct represents the subject or issuer name in a certificate.
///
/// # Fields
/// * `common_name` - The common name (CN).
/// * `country` - The country (C).
/// * `state` - The state or province (ST).
/// * `locality` - The locality or city (L).
/// * `organization` - The organization (O).
/// * `organization_unit` - The organizational unit (OU).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
}

impl DistinguishedName {
    /// Converts the distinguished name to an X.509-compatible format.
    ///
    /// Attributes are emitted from the most general (C) to the most specific
    /// (CN); absent or empty attributes are left out. Values are UTF8String
    /// except the country, which RFC 5280 requires as PrintableString.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName> {
        let attributes = [
            (COUNTRY, self.country.as_deref()),
            (STATE, self.state.as_deref()),
            (LOCALITY, self.locality.as_deref()),
            (ORGANIZATION, self.organization.as_deref()),
            (ORGANIZATION_UNIT, self.organization_unit.as_deref()),
            (COMMON_NAME, Some(self.common_name.as_str())),
        ];

        let mut rdns = Vec::new();
        for (oid, value) in attributes {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            let value = if oid == COUNTRY {
                PrintableStringRef::new(value).map_err(|e| {
                    CertError::InvalidSubject(format!("country `{value}`: {e}"))
                })?;
                Any::new(Tag::PrintableString, value.as_bytes())?
            } else {
                Any::new(Tag::Utf8String, value.as_bytes())?
            };
            let atv = AttributeTypeAndValue { oid, value };
            rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?));
        }
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// Only string-typed attributes are read; anything else is skipped.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Self {
        let mut dn = DistinguishedName::default();

        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let Some(value) = attribute_string(&attr.value) else {
                    continue;
                };
                let slot = match attr.oid {
                    COMMON_NAME => {
                        dn.common_name = value;
                        continue;
                    }
                    COUNTRY => &mut dn.country,
                    STATE => &mut dn.state,
                    LOCALITY => &mut dn.locality,
                    ORGANIZATION => &mut dn.organization,
                    ORGANIZATION_UNIT => &mut dn.organization_unit,
                    _ => continue,
                };
                *slot = Some(value);
            }
        }

        dn
    }
}

fn attribute_string(value: &Any) -> Option<String> {
    match value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String => {
            std::str::from_utf8(value.value()).ok().map(str::to_string)
        }
        _ => None,
    }
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period of `duration` beginning at `not_before`.
    ///
    /// Fails with [`CertError::InvalidInput`] when the end lies outside the
    /// representable date range.
    pub fn starting_at(not_before: OffsetDateTime, duration: Duration) -> Result<Self> {
        let not_after = not_before.checked_add(duration).ok_or_else(|| {
            CertError::InvalidInput(format!("{not_before} plus {duration} is out of range"))
        })?;
        Ok(Self {
            not_before,
            not_after,
        })
    }

    /// Narrows this window so it never leaves `outer`.
    pub fn clamped_to(self, outer: &Validity) -> Self {
        Self {
            not_before: self.not_before.max(outer.not_before),
            not_after: self.not_after.min(outer.not_after),
        }
    }

    pub fn contains(&self, at: OffsetDateTime) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    ///
    /// # Arguments
    /// * `extension` - The extension to encode.
    /// * `critical` - Indicates if the extension is critical.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinguished_name_roundtrip() {
        let dn = DistinguishedName::builder()
            .common_name("alice, the admin".to_string())
            .organization("Example Corp".to_string())
            .country("US".to_string())
            .build();
        let x509 = dn.as_x509_name().unwrap();
        assert_eq!(x509.0.len(), 3);
        assert_eq!(DistinguishedName::from_x509_name(&x509), dn);
    }

    #[test]
    fn test_empty_attributes_are_omitted() {
        let dn = DistinguishedName::builder()
            .common_name("node".to_string())
            .organization_unit(String::new())
            .build();
        let x509 = dn.as_x509_name().unwrap();
        assert_eq!(x509.0.len(), 1);
    }

    #[test]
    fn test_invalid_country_is_rejected() {
        let dn = DistinguishedName::builder()
            .common_name("node".to_string())
            .country("Ü@".to_string())
            .build();
        assert!(matches!(
            dn.as_x509_name(),
            Err(CertError::InvalidSubject(_))
        ));
    }

    #[test]
    fn test_validity_clamp() {
        let now = OffsetDateTime::now_utc();
        let outer = Validity::starting_at(now, Duration::days(30)).unwrap();
        let inner =
            Validity::starting_at(now - Duration::minutes(5), Duration::days(90)).unwrap();
        let clamped = inner.clamped_to(&outer);
        assert_eq!(clamped.not_before, outer.not_before);
        assert_eq!(clamped.not_after, outer.not_after);
        assert!(clamped.contains(now + Duration::days(1)));
    }

    #[test]
    fn test_validity_out_of_range() {
        let now = OffsetDateTime::now_utc();
        assert!(matches!(
            Validity::starting_at(now, Duration::MAX),
            Err(CertError::InvalidInput(_))
        ));
    }
}
