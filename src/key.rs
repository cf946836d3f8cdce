use std::fmt;

use const_oid::db::{rfc5912, rfc8410};
use der::{Decode, SecretDocument};
use ed25519_dalek::{
    Signature as Ed25519Signature, SigningKey as Ed25519SigningKey,
    VerifyingKey as Ed25519VerifyingKey,
};
use p256::ecdsa::{
    DerSignature as P256DerSignature, SigningKey as P256SigningKey,
    VerifyingKey as P256VerifyingKey,
};
use p384::ecdsa::{
    DerSignature as P384DerSignature, SigningKey as P384SigningKey,
    VerifyingKey as P384VerifyingKey,
};
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rand_core::OsRng;
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1::DecodeRsaPrivateKey,
    pkcs1v15,
    signature::{SignatureEncoding, Signer, Verifier},
    traits::PublicKeyParts,
};
use sha2::Sha256;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::error::{CertError, Result};

/// Smallest RSA modulus accepted for generation.
pub const MIN_RSA_BITS: usize = 2048;

/// Supported key algorithms for generated and imported keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// RSA with the given modulus size in bits.
    Rsa { bits: usize },
    /// ECDSA over NIST P-256.
    EcdsaP256,
    /// ECDSA over NIST P-384.
    EcdsaP384,
    /// Edwards-curve signatures over Curve25519.
    Ed25519,
}

impl KeyAlgorithm {
    /// Approximate security strength in bits (NIST SP 800-57 equivalences).
    pub fn security_bits(&self) -> u32 {
        match self {
            KeyAlgorithm::Rsa { bits } if *bits >= 15360 => 256,
            KeyAlgorithm::Rsa { bits } if *bits >= 7680 => 192,
            KeyAlgorithm::Rsa { bits } if *bits >= 3072 => 128,
            KeyAlgorithm::Rsa { bits } if *bits >= 2048 => 112,
            KeyAlgorithm::Rsa { .. } => 80,
            KeyAlgorithm::EcdsaP256 | KeyAlgorithm::Ed25519 => 128,
            KeyAlgorithm::EcdsaP384 => 192,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            KeyAlgorithm::Rsa { bits } if *bits < MIN_RSA_BITS => Err(CertError::InvalidInput(
                format!("RSA keys must be at least {MIN_RSA_BITS} bits, got {bits}"),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Rsa { bits } => write!(f, "RSA-{bits}"),
            KeyAlgorithm::EcdsaP256 => f.write_str("ECDSA P-256"),
            KeyAlgorithm::EcdsaP384 => f.write_str("ECDSA P-384"),
            KeyAlgorithm::Ed25519 => f.write_str("Ed25519"),
        }
    }
}

enum SigningKey {
    Rsa(Box<RsaPrivateKey>),
    EcdsaP256(P256SigningKey),
    EcdsaP384(P384SigningKey),
    Ed25519(Ed25519SigningKey),
}

/// A private key together with its PKCS#8 encoding.
///
/// The encoding is produced once, when the key is generated or decoded, so
/// exporting the key later cannot fail. The document is zeroized on drop.
pub struct KeyPair {
    key: SigningKey,
    pkcs8: SecretDocument,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate a fresh key pair for the given algorithm from the OS entropy source.
    pub fn generate(algorithm: KeyAlgorithm) -> Result<Self> {
        algorithm.validate()?;
        let mut rng = OsRng;
        let key = match algorithm {
            KeyAlgorithm::Rsa { bits } => {
                let private = RsaPrivateKey::new(&mut rng, bits)
                    .map_err(|e| CertError::KeyGenerationFailure(e.to_string()))?;
                SigningKey::Rsa(Box::new(private))
            }
            KeyAlgorithm::EcdsaP256 => SigningKey::EcdsaP256(P256SigningKey::random(&mut rng)),
            KeyAlgorithm::EcdsaP384 => SigningKey::EcdsaP384(P384SigningKey::random(&mut rng)),
            KeyAlgorithm::Ed25519 => SigningKey::Ed25519(Ed25519SigningKey::generate(&mut rng)),
        };
        Self::new(key).map_err(|e| CertError::KeyGenerationFailure(e.to_string()))
    }

    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        Self::generate(KeyAlgorithm::Rsa { bits })
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Result<Self> {
        Self::generate(KeyAlgorithm::EcdsaP256)
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Result<Self> {
        Self::generate(KeyAlgorithm::EcdsaP384)
    }

    /// Generate an Ed25519 key pair.
    pub fn generate_ed25519() -> Result<Self> {
        Self::generate(KeyAlgorithm::Ed25519)
    }

    fn new(key: SigningKey) -> Result<Self> {
        let pkcs8 = match &key {
            SigningKey::Rsa(private) => private.to_pkcs8_der(),
            SigningKey::EcdsaP256(signing_key) => signing_key.to_pkcs8_der(),
            SigningKey::EcdsaP384(signing_key) => signing_key.to_pkcs8_der(),
            SigningKey::Ed25519(signing_key) => signing_key.to_pkcs8_der(),
        }?;
        Ok(Self { key, pkcs8 })
    }

    /// Import a key from a DER-encoded PKCS#8 `PrivateKeyInfo`.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = pkcs8::PrivateKeyInfo::from_der(der)?;
        let key = match info.algorithm.oid {
            rfc5912::RSA_ENCRYPTION => {
                SigningKey::Rsa(Box::new(RsaPrivateKey::from_pkcs8_der(der)?))
            }
            rfc5912::ID_EC_PUBLIC_KEY => match info.algorithm.parameters_oid()? {
                rfc5912::SECP_256_R_1 => {
                    SigningKey::EcdsaP256(P256SigningKey::from_pkcs8_der(der)?)
                }
                rfc5912::SECP_384_R_1 => {
                    SigningKey::EcdsaP384(P384SigningKey::from_pkcs8_der(der)?)
                }
                curve => {
                    return Err(CertError::UnsupportedAlgorithm(format!(
                        "elliptic curve {curve}"
                    )));
                }
            },
            rfc8410::ID_ED_25519 => SigningKey::Ed25519(Ed25519SigningKey::from_pkcs8_der(der)?),
            oid => {
                return Err(CertError::UnsupportedAlgorithm(format!(
                    "private key algorithm {oid}"
                )));
            }
        };
        Self::new(key)
    }

    /// Import an elliptic curve key from a DER-encoded SEC1 `ECPrivateKey`.
    ///
    /// The curve is taken from the embedded parameters; P-256 and P-384 are accepted.
    pub fn from_sec1_der(der: &[u8]) -> Result<Self> {
        let key = if let Ok(secret) = p256::SecretKey::from_sec1_der(der) {
            SigningKey::EcdsaP256(secret.into())
        } else if let Ok(secret) = p384::SecretKey::from_sec1_der(der) {
            SigningKey::EcdsaP384(secret.into())
        } else {
            return Err(CertError::MalformedEncoding(
                "not a P-256 or P-384 SEC1 private key".to_string(),
            ));
        };
        Self::new(key)
    }

    /// Import an RSA key from a DER-encoded PKCS#1 `RSAPrivateKey`.
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs1_der(der)?;
        Self::new(SigningKey::Rsa(Box::new(private)))
    }

    /// The PKCS#8 DER encoding of this private key.
    pub fn pkcs8_der(&self) -> &[u8] {
        self.pkcs8.as_bytes()
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match &self.key {
            SigningKey::Rsa(private) => KeyAlgorithm::Rsa {
                bits: private.size() * 8,
            },
            SigningKey::EcdsaP256(_) => KeyAlgorithm::EcdsaP256,
            SigningKey::EcdsaP384(_) => KeyAlgorithm::EcdsaP384,
            SigningKey::Ed25519(_) => KeyAlgorithm::Ed25519,
        }
    }

    /// The signature algorithm certificates signed by this key carry.
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match &self.key {
            SigningKey::Rsa(_) => SignatureAlgorithm::Sha256WithRsa,
            SigningKey::EcdsaP256(_) => SignatureAlgorithm::Sha256WithEcdsa,
            SigningKey::EcdsaP384(_) => SignatureAlgorithm::Sha384WithEcdsa,
            SigningKey::Ed25519(_) => SignatureAlgorithm::Ed25519,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match &self.key {
            SigningKey::Rsa(private) => PublicKey::Rsa(private.to_public_key()),
            SigningKey::EcdsaP256(signing_key) => {
                PublicKey::EcdsaP256(signing_key.verifying_key().to_owned())
            }
            SigningKey::EcdsaP384(signing_key) => {
                PublicKey::EcdsaP384(signing_key.verifying_key().to_owned())
            }
            SigningKey::Ed25519(signing_key) => PublicKey::Ed25519(signing_key.verifying_key()),
        }
    }

    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        self.public_key().to_spki()
    }

    /// Sign `data` with the algorithm reported by [`KeyPair::signature_algorithm`].
    ///
    /// ECDSA signatures are returned DER-encoded, as X.509 expects.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signing_failure = |e: rsa::signature::Error| CertError::SigningFailure(e.to_string());
        match &self.key {
            SigningKey::Rsa(private) => {
                let signing_key = pkcs1v15::SigningKey::<Sha256>::new(RsaPrivateKey::clone(private));
                let signature = signing_key.try_sign(data).map_err(signing_failure)?;
                Ok(signature.to_vec())
            }
            SigningKey::EcdsaP256(signing_key) => {
                let signature: P256DerSignature =
                    signing_key.try_sign(data).map_err(signing_failure)?;
                Ok(signature.as_bytes().to_vec())
            }
            SigningKey::EcdsaP384(signing_key) => {
                let signature: P384DerSignature =
                    signing_key.try_sign(data).map_err(signing_failure)?;
                Ok(signature.as_bytes().to_vec())
            }
            SigningKey::Ed25519(signing_key) => {
                let signature: Ed25519Signature =
                    signing_key.try_sign(data).map_err(signing_failure)?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }
}

/// The public half of a [`KeyPair`], or the key embedded in a certificate.
#[derive(Debug, Clone, PartialEq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
    Ed25519(Ed25519VerifyingKey),
}

impl PublicKey {
    /// Decode a public key from an X.509 `SubjectPublicKeyInfo`.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = der::Encode::to_der(spki)?;
        let key = match spki.algorithm.oid {
            rfc5912::RSA_ENCRYPTION => PublicKey::Rsa(RsaPublicKey::from_public_key_der(&der)?),
            rfc5912::ID_EC_PUBLIC_KEY => {
                let curve = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .map(|params| params.decode_as::<const_oid::ObjectIdentifier>())
                    .transpose()?;
                match curve {
                    Some(rfc5912::SECP_256_R_1) => {
                        PublicKey::EcdsaP256(P256VerifyingKey::from_public_key_der(&der)?)
                    }
                    Some(rfc5912::SECP_384_R_1) => {
                        PublicKey::EcdsaP384(P384VerifyingKey::from_public_key_der(&der)?)
                    }
                    Some(curve) => {
                        return Err(CertError::UnsupportedAlgorithm(format!(
                            "elliptic curve {curve}"
                        )));
                    }
                    None => {
                        return Err(CertError::MalformedEncoding(
                            "EC public key without curve parameters".to_string(),
                        ));
                    }
                }
            }
            rfc8410::ID_ED_25519 => {
                PublicKey::Ed25519(Ed25519VerifyingKey::from_public_key_der(&der)?)
            }
            oid => {
                return Err(CertError::UnsupportedAlgorithm(format!(
                    "public key algorithm {oid}"
                )));
            }
        };
        Ok(key)
    }

    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let document = match self {
            PublicKey::Rsa(public) => public.to_public_key_der(),
            PublicKey::EcdsaP256(verifying_key) => verifying_key.to_public_key_der(),
            PublicKey::EcdsaP384(verifying_key) => verifying_key.to_public_key_der(),
            PublicKey::Ed25519(verifying_key) => verifying_key.to_public_key_der(),
        }?;
        Ok(SubjectPublicKeyInfoOwned::from_der(document.as_bytes())?)
    }

    /// The signature algorithm a certificate signed by this key must carry.
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            PublicKey::Rsa(_) => SignatureAlgorithm::Sha256WithRsa,
            PublicKey::EcdsaP256(_) => SignatureAlgorithm::Sha256WithEcdsa,
            PublicKey::EcdsaP384(_) => SignatureAlgorithm::Sha384WithEcdsa,
            PublicKey::Ed25519(_) => SignatureAlgorithm::Ed25519,
        }
    }

    /// Verify `signature` over `data`, in the encoding produced by [`KeyPair::sign_data`].
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        let failure = |e: rsa::signature::Error| CertError::VerificationFailure(e.to_string());
        match self {
            PublicKey::Rsa(public) => {
                let verifying_key = pkcs1v15::VerifyingKey::<Sha256>::new(public.clone());
                let signature = pkcs1v15::Signature::try_from(signature).map_err(failure)?;
                verifying_key.verify(data, &signature).map_err(failure)
            }
            PublicKey::EcdsaP256(verifying_key) => {
                let signature = P256DerSignature::try_from(signature).map_err(failure)?;
                verifying_key.verify(data, &signature).map_err(failure)
            }
            PublicKey::EcdsaP384(verifying_key) => {
                let signature = P384DerSignature::try_from(signature).map_err(failure)?;
                verifying_key.verify(data, &signature).map_err(failure)
            }
            PublicKey::Ed25519(verifying_key) => {
                let signature = Ed25519Signature::from_slice(signature).map_err(failure)?;
                verifying_key.verify(data, &signature).map_err(failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify_each_curve() {
        for key_pair in [
            KeyPair::generate_ecdsa_p256().unwrap(),
            KeyPair::generate_ecdsa_p384().unwrap(),
            KeyPair::generate_ed25519().unwrap(),
        ] {
            let signature = key_pair.sign_data(b"to be signed").unwrap();
            let public_key = key_pair.public_key();
            public_key.verify(b"to be signed", &signature).unwrap();
            assert!(public_key.verify(b"tampered", &signature).is_err());
        }
    }

    #[test]
    fn test_pkcs8_reimport_preserves_public_key() {
        let key_pair = KeyPair::generate_ecdsa_p384().unwrap();
        let imported = KeyPair::from_pkcs8_der(key_pair.pkcs8_der()).unwrap();
        assert_eq!(imported.algorithm(), KeyAlgorithm::EcdsaP384);
        assert_eq!(imported.public_key(), key_pair.public_key());
    }

    #[test]
    fn test_spki_roundtrip() {
        let key_pair = KeyPair::generate_ed25519().unwrap();
        let spki = key_pair.as_spki().unwrap();
        assert_eq!(spki.algorithm.oid, rfc8410::ID_ED_25519);
        assert_eq!(PublicKey::from_x509spki(&spki).unwrap(), key_pair.public_key());
    }

    #[test]
    fn test_small_rsa_is_rejected() {
        let err = KeyPair::generate_rsa(1024).unwrap_err();
        assert!(matches!(err, CertError::InvalidInput(_)));
    }

    #[test]
    fn test_security_bits_ordering() {
        assert!(KeyAlgorithm::EcdsaP384.security_bits() > KeyAlgorithm::EcdsaP256.security_bits());
        assert!(
            KeyAlgorithm::Rsa { bits: 2048 }.security_bits()
                < KeyAlgorithm::EcdsaP256.security_bits()
        );
        assert_eq!(
            KeyAlgorithm::Rsa { bits: 3072 }.security_bits(),
            KeyAlgorithm::Ed25519.security_bits()
        );
    }

    #[test]
    fn test_debug_output_is_redacted() {
        let key_pair = KeyPair::generate_ecdsa_p256().unwrap();
        let debug = format!("{key_pair:?}");
        assert!(debug.contains("EcdsaP256"));
        assert!(!debug.contains("secret"));
    }
}
