//! use clustercert::error::CertError;

use thiserror::Error;

use crate::store::StoreError;

/// Represents errors that can occur while parsing, issuing or encoding
/// certificate material.
///
/// Every failure is scoped to a single call. Nothing here is fatal to a
/// long-running process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CertError {
    /// A required field is absent from a bundle.
    #[error("Bundle is missing required field `{0}`")]
    MissingField(String),

    /// Bytes are not valid key or certificate material.
    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),

    /// The key or certificate uses an algorithm this crate cannot handle.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The CA private key is not the pair of the CA certificate's public key.
    #[error("CA private key does not match the CA certificate public key")]
    KeyCertificateMismatch,

    /// The CA certificate is outside its validity window.
    #[error("CA certificate is not valid at this time: {0}")]
    ExpiredCa(String),

    /// The caller supplied an unusable subject or alternative name.
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    /// Error due to invalid configuration or arguments.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The key generation backend failed.
    #[error("Key generation error: {0}")]
    KeyGenerationFailure(String),

    /// The signing backend failed.
    #[error("Signing error: {0}")]
    SigningFailure(String),

    /// A signature did not verify against the expected key.
    #[error("Verification failed: {0}")]
    VerificationFailure(String),

    /// The object store collaborator failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CertError>;

impl From<der::Error> for CertError {
    /// Converts a `der::Error` into a `CertError`.
    fn from(err: der::Error) -> Self {
        CertError::MalformedEncoding(err.to_string())
    }
}

impl From<x509_cert::spki::Error> for CertError {
    fn from(err: x509_cert::spki::Error) -> Self {
        CertError::MalformedEncoding(err.to_string())
    }
}

impl From<pkcs8::Error> for CertError {
    fn from(err: pkcs8::Error) -> Self {
        CertError::MalformedEncoding(err.to_string())
    }
}

impl From<pem::PemError> for CertError {
    fn from(err: pem::PemError) -> Self {
        CertError::MalformedEncoding(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for CertError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        CertError::MalformedEncoding(err.to_string())
    }
}
