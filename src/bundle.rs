use std::collections::BTreeMap;
use std::fmt;

use crate::ca::CAKeyPair;
use crate::codec;
use crate::error::{CertError, Result};
use crate::issuer::LeafKeyPair;

/// CA certificate, PEM.
pub const CA_CERT_KEY: &str = "ca.crt";
/// CA private key, PKCS#8 PEM.
pub const CA_PRIVATE_KEY_KEY: &str = "ca.key";
/// Leaf certificate, PEM.
pub const TLS_CERT_KEY: &str = "tls.crt";
/// Leaf private key, PKCS#8 PEM.
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// Address of a bundle in the object store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// How the object store should type the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BundleKind {
    /// Arbitrary named blobs, used for CA material.
    #[default]
    Opaque,
    /// A TLS certificate, its key and the CA certificate.
    Tls,
}

/// A mapping of well-known field names to byte blobs, tagged with the
/// identity the object store files it under.
///
/// `Debug` lists field names only; values may hold private keys.
#[derive(Clone, PartialEq, Eq)]
pub struct Bundle {
    pub identity: ObjectKey,
    pub kind: BundleKind,
    pub data: BTreeMap<String, Vec<u8>>,
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("identity", &self.identity)
            .field("kind", &self.kind)
            .field("fields", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Bundle {
    pub fn new(identity: ObjectKey, kind: BundleKind) -> Self {
        Self {
            identity,
            kind,
            data: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// Like [`Bundle::get`], failing with [`CertError::MissingField`] when absent.
    pub fn require(&self, key: &str) -> Result<&[u8]> {
        self.get(key)
            .ok_or_else(|| CertError::MissingField(key.to_string()))
    }
}

/// Serializes key material into a [`Bundle`].
///
/// Encoding is total: certificates and keys carry their encodings from the
/// moment they are created or decoded.
pub trait ToBundle {
    fn to_bundle(&self, identity: ObjectKey) -> Bundle;
}

impl ToBundle for CAKeyPair {
    fn to_bundle(&self, identity: ObjectKey) -> Bundle {
        Bundle::new(identity, BundleKind::Opaque)
            .with_field(CA_CERT_KEY, codec::encode_certificate(self.certificate()))
            .with_field(CA_PRIVATE_KEY_KEY, codec::encode_private_key(self.private_key()))
    }
}

impl ToBundle for LeafKeyPair {
    fn to_bundle(&self, identity: ObjectKey) -> Bundle {
        Bundle::new(identity, BundleKind::Tls)
            .with_field(TLS_CERT_KEY, codec::encode_certificate(self.certificate()))
            .with_field(TLS_PRIVATE_KEY_KEY, codec::encode_private_key(self.private_key()))
            .with_field(CA_CERT_KEY, codec::encode_certificate(self.ca_certificate()))
    }
}
