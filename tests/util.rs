#![allow(dead_code)]

use clustercert::bundle::{Bundle, ObjectKey, ToBundle};
use clustercert::ca::{CAKeyPair, RootOptions};
use clustercert::cert::params::DistinguishedName;

pub const NAMESPACE: &str = "db";
pub const CLUSTER: &str = "cluster-example";

pub fn ca_subject() -> DistinguishedName {
    DistinguishedName::builder()
        .common_name(CLUSTER.to_string())
        .organization("Example Corp".to_string())
        .build()
}

/// A ten year ECDSA P-256 root, as a fresh cluster would have.
pub fn generate_ca_cert() -> CAKeyPair {
    generate_ca_cert_with(&RootOptions::default())
}

pub fn generate_ca_cert_with(options: &RootOptions) -> CAKeyPair {
    CAKeyPair::create_root(ca_subject(), options).unwrap()
}

pub fn ca_bundle(ca: &CAKeyPair) -> Bundle {
    ca.to_bundle(ObjectKey::new(NAMESPACE, format!("{CLUSTER}-ca")))
}
