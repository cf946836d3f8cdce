//! # ClusterCert - Cluster CA and Client Certificate Issuance
//!
//! ClusterCert is the certificate engine behind a database cluster's TLS
//! setup, built entirely with rustcrypto libraries. It reads a cluster CA from
//! a bundle of named blobs, signs fresh leaf certificates under it with the
//! extensions each role needs, and packages the results back into bundles for
//! an object store.
//!
//! ## Supported Key Types
//!
//! - **RSA**: 2048 bits and up, signed with SHA-256 (PKCS#1 v1.5)
//! - **ECDSA**: P-256 (SHA-256) and P-384 (SHA-384)
//! - **Ed25519**: Edwards curve digital signature algorithm
//!
//! Private keys are read from PKCS#8, SEC1 or PKCS#1 PEM and always written as
//! PKCS#8 PEM. Certificates are read and written as PEM.
//!
//! ## Quick Start
//!
//! ### Creating a Root and Issuing a Client Certificate
//!
//! ```rust,no_run
//! use clustercert::{
//!     ca::{CAKeyPair, RootOptions},
//!     cert::params::DistinguishedName,
//!     issuer::CertificateRole,
//! };
//!
//! # fn main() -> Result<(), clustercert::error::CertError> {
//! let subject = DistinguishedName::builder()
//!     .common_name("cluster-example".to_string())
//!     .organization("Example Corp".to_string())
//!     .build();
//! let ca = CAKeyPair::create_root(subject, &RootOptions::default())?;
//!
//! let alice = ca.issue_pair("alice", CertificateRole::Client, &[])?;
//! alice.certificate().verify_signed_by(ca.certificate())?;
//! println!("{}", alice.certificate().to_pem());
//! # Ok(())
//! # }
//! ```
//!
//! ### Server Certificates and Issuance Options
//!
//! ```rust,no_run
//! use clustercert::{
//!     ca::{CAKeyPair, RootOptions},
//!     cert::{extensions::SubjectAltName, params::DistinguishedName},
//!     issuer::{CertificateRole, IssueOptions},
//!     key::KeyAlgorithm,
//! };
//!
//! # fn main() -> Result<(), clustercert::error::CertError> {
//! let ca = CAKeyPair::create_root(DistinguishedName::default(), &RootOptions::default())?;
//!
//! let options = IssueOptions::builder()
//!     .validity(time::Duration::days(30))
//!     .key_algorithm(KeyAlgorithm::EcdsaP384)
//!     .build();
//! let server = ca.issue_pair_with(
//!     "cluster-example-rw",
//!     CertificateRole::Server,
//!     &["cluster-example-rw.db.svc".to_string(), "10.0.0.7".to_string()],
//!     &options,
//! )?;
//!
//! let san = server.certificate().extension::<SubjectAltName>()?;
//! println!("{san:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ### Storing Certificates
//!
//! ```rust,no_run
//! use clustercert::{
//!     bundle::{ObjectKey, ToBundle},
//!     ca::{CAKeyPair, RootOptions},
//!     cert::params::DistinguishedName,
//!     command::{GenerateParams, generate_user_certificate},
//!     issuer::IssueOptions,
//!     store::MemoryStore,
//! };
//!
//! # fn main() -> Result<(), clustercert::error::CertError> {
//! let store = MemoryStore::new();
//! let ca = CAKeyPair::create_root(DistinguishedName::default(), &RootOptions::default())?;
//! store.insert(ca.to_bundle(ObjectKey::new("db", "cluster-example-ca")));
//!
//! let params = GenerateParams::builder()
//!     .name("alice-cert")
//!     .namespace("db")
//!     .user("alice")
//!     .cluster_name("cluster-example")
//!     .build();
//! let bundle = generate_user_certificate(&store, &params, &IssueOptions::default(), false)?;
//! println!("secret/{} created", bundle.identity.name);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`error::CertError`]; failures are scoped to the call
//! that produced them:
//!
//! ```rust
//! use clustercert::{bundle::{Bundle, BundleKind, ObjectKey}, ca::parse_ca, error::CertError};
//!
//! let bundle = Bundle::new(ObjectKey::new("db", "cluster-example-ca"), BundleKind::Opaque);
//! match parse_ca(&bundle) {
//!     Ok(_) => println!("CA loaded"),
//!     Err(CertError::MissingField(field)) => println!("missing {field}"),
//!     Err(e) => println!("Other error: {e}"),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`key`]: Key generation, import, signing and verification
//! - [`cert`]: Certificate inspection, parameters and X.509 extensions
//! - [`codec`]: PEM encoding and decoding of keys and certificates
//! - [`ca`]: CA material parsing and root creation
//! - [`issuer`]: Leaf issuance per certificate role
//! - [`bundle`]: Named-blob bundles for the object store
//! - [`store`]: The object store interface and an in-memory implementation
//! - [`command`]: User certificate generation against a stored cluster CA
//! - [`error`]: Error types
//! - [`tbs_certificate`]: Low-level certificate structure manipulation

pub mod bundle;
pub mod ca;
pub mod cert;
pub mod codec;
pub mod command;
pub mod error;
pub mod issuer;
pub mod key;
pub mod store;
pub mod tbs_certificate;
