//! Digital signatures using RSA-2048 with PKCS#1 v1.5 padding over SHA-256.
//!
//! Every signature on the wire is produced by this scheme. Public keys
//! travel as X.509/SPKI DER, signatures as raw RSA output; both are
//! base64-encoded when embedded in JSON.

use rsa::pkcs1v15::{Signature as RsaSignature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher as StdHasher};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use super::{CryptoError, CryptoResult};

/// RSA modulus size in bits
pub const RSA_KEY_BITS: usize = 2048;
/// Signature size in bytes for RSA-2048 (one modulus-width block)
pub const SIGNATURE_SIZE: usize = RSA_KEY_BITS / 8;

/// An RSA signature over SHA-256 (PKCS#1 v1.5)
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&BASE64.encode(&self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let bytes = BASE64.decode(&s).map_err(serde::de::Error::custom)?;
            Ok(Self(bytes))
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            Ok(Self(bytes))
        }
    }
}

impl Signature {
    /// Create from raw signature bytes.
    ///
    /// Length is not checked here: a signature of the wrong width can
    /// never verify, and rejecting it at decode time would turn a
    /// verification failure into a parse failure.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Parse from a base64 string
    ///
    /// # Errors
    /// Returns error if the input is not valid base64
    pub fn from_base64(s: &str) -> CryptoResult<Self> {
        let bytes = BASE64
            .decode(s)
            .map_err(|_| CryptoError::InvalidSignature)?;
        Ok(Self(bytes))
    }

    /// Get underlying bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to base64 string
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b64 = self.to_base64();
        let head = &b64[..b64.len().min(16)];
        write!(f, "Sig({head}..)")
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// An RSA public key in X.509/SPKI DER encoding
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(Vec<u8>);

impl Hash for PublicKey {
    fn hash<H: StdHasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&BASE64.encode(&self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let bytes = BASE64.decode(&s).map_err(serde::de::Error::custom)?;
            Ok(Self(bytes))
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            Ok(Self(bytes))
        }
    }
}

impl PublicKey {
    /// Create from DER bytes (validated)
    ///
    /// # Errors
    /// Returns error if the bytes are not a valid SPKI-encoded RSA key
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        RsaPublicKey::from_public_key_der(bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self(bytes.to_vec()))
    }

    /// Create from DER bytes without validation (for deserialization).
    /// An undecodable key surfaces later as a verification failure,
    /// the same way a forged signature does.
    #[must_use]
    pub fn from_bytes_unchecked(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Parse from a base64 string (validated)
    ///
    /// # Errors
    /// Returns error if the input is not base64 or not a valid key
    pub fn from_base64(s: &str) -> CryptoResult<Self> {
        let bytes = BASE64
            .decode(s)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Get the DER encoding
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to base64 string
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }

    fn from_rsa(key: &RsaPublicKey) -> CryptoResult<Self> {
        let der = key
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
        Ok(Self(der.as_bytes().to_vec()))
    }

    fn decode(&self) -> CryptoResult<RsaPublicKey> {
        RsaPublicKey::from_public_key_der(&self.0)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b64 = self.to_base64();
        let head = &b64[..b64.len().min(16)];
        write!(f, "PubKey({head}..)")
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

/// An RSA private key
///
/// SECURITY: This type intentionally does not implement Clone or Debug
/// to prevent accidental key leakage.
pub struct SecretKey(RsaPrivateKey);

impl SecretKey {
    /// Parse from PKCS#8 PEM text
    ///
    /// # Errors
    /// Returns error if the PEM does not contain a valid RSA private key
    pub fn from_pkcs8_pem(pem: &str) -> CryptoResult<Self> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| CryptoError::InvalidSecretKey(e.to_string()))?;
        Ok(Self(key))
    }

    /// Encode as PKCS#8 PEM text (for persistence)
    ///
    /// # Security
    /// The returned text is the raw secret key material.
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn to_pkcs8_pem(&self) -> CryptoResult<String> {
        self.0
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.as_str().to_owned())
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))
    }

    /// Sign a message
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        let signing_key = SigningKey::<Sha256>::new(self.0.clone());
        let sig = signing_key
            .try_sign(message)
            .expect("signing should not fail with a valid key");
        Signature(sig.to_vec())
    }

    fn derive_public(&self) -> CryptoResult<PublicKey> {
        PublicKey::from_rsa(&self.0.to_public_key())
    }
}

/// A keypair containing both secret and public keys
pub struct Keypair {
    secret: SecretKey,
    public: PublicKey,
}

impl Keypair {
    /// Generate a new random RSA-2048 keypair.
    ///
    /// Prime generation takes a noticeable fraction of a second; callers
    /// on async paths should move this off the reactor.
    ///
    /// # Errors
    /// Returns error if key generation fails
    pub fn generate() -> CryptoResult<Self> {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), RSA_KEY_BITS)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let secret = SecretKey(key);
        let public = secret.derive_public()?;
        Ok(Self { secret, public })
    }

    /// Rebuild a keypair from a stored secret key
    ///
    /// # Errors
    /// Returns error if the public half cannot be derived
    pub fn from_secret(secret: SecretKey) -> CryptoResult<Self> {
        let public = secret.derive_public()?;
        Ok(Self { secret, public })
    }

    /// Get the public key
    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Sign a message
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.secret.sign(message)
    }

    /// Get the secret key (for persistence)
    #[must_use]
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}

/// Sign a message with a secret key (convenience function)
#[must_use]
pub fn sign(secret: &SecretKey, message: &[u8]) -> Signature {
    secret.sign(message)
}

/// Verify a signature against a public key and message
///
/// # Errors
/// Returns error if the key does not decode or the signature is invalid
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> CryptoResult<()> {
    let rsa_key = public_key.decode()?;
    let verifying_key = VerifyingKey::<Sha256>::new(rsa_key);
    let sig = RsaSignature::try_from(signature.0.as_slice())
        .map_err(|_| CryptoError::InvalidSignature)?;
    verifying_key
        .verify(message, &sig)
        .map_err(|_| CryptoError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn test_keypair() -> &'static Keypair {
        static KEYPAIR: OnceLock<Keypair> = OnceLock::new();
        KEYPAIR.get_or_init(|| Keypair::generate().expect("keygen"))
    }

    #[test]
    fn test_signature_size() {
        let sig = test_keypair().sign(b"test");
        assert_eq!(sig.as_bytes().len(), SIGNATURE_SIZE);
    }

    #[test]
    fn test_sign_verify() {
        let keypair = test_keypair();
        let message = b"test message";

        let sig = keypair.sign(message);
        assert!(verify(keypair.public_key(), message, &sig).is_ok());
    }

    #[test]
    fn test_wrong_message_fails() {
        let keypair = test_keypair();
        let sig = keypair.sign(b"original");

        assert!(verify(keypair.public_key(), b"tampered", &sig).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let keypair1 = test_keypair();
        let keypair2 = Keypair::generate().unwrap();
        let message = b"test";

        let sig = keypair1.sign(message);
        assert!(verify(keypair2.public_key(), message, &sig).is_err());
    }

    #[test]
    fn test_deterministic_signatures() {
        // PKCS#1 v1.5 is a deterministic padding scheme
        let keypair = test_keypair();
        let a = keypair.sign(b"same input");
        let b = keypair.sign(b"same input");
        assert_eq!(a, b);
    }

    #[test]
    fn test_pubkey_base64_roundtrip() {
        let keypair = test_keypair();
        let b64 = keypair.public_key().to_base64();
        let parsed = PublicKey::from_base64(&b64).unwrap();
        assert_eq!(keypair.public_key(), &parsed);
    }

    #[test]
    fn test_pubkey_rejects_garbage_der() {
        assert!(PublicKey::from_bytes(&[0xde, 0xad, 0xbe, 0xef]).is_err());
        assert!(PublicKey::from_base64("bm90IGEga2V5").is_err());
    }

    #[test]
    fn test_secret_key_pem_roundtrip() {
        let keypair = test_keypair();
        let pem = keypair.secret_key().to_pkcs8_pem().unwrap();
        let restored = SecretKey::from_pkcs8_pem(&pem).unwrap();
        let restored_kp = Keypair::from_secret(restored).unwrap();
        assert_eq!(keypair.public_key(), restored_kp.public_key());

        let sig = restored_kp.sign(b"roundtrip test");
        assert!(verify(keypair.public_key(), b"roundtrip test", &sig).is_ok());
    }

    #[test]
    fn test_signature_json_is_base64() {
        let sig = Signature::from_bytes(&[1, 2, 3, 4]);
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, "\"AQIDBA==\"");

        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }
}
